// ABOUTME: Simulated cloud backend implementing every collaborator trait.
// ABOUTME: Holds fleets, routes, state, and artifacts in memory, optionally persisted as JSON.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::error::{DecodeSnafu, EncodeSnafu, ReadSnafu, WriteSnafu};
use super::{
    Capacity, CloudError, ColorStateStore, DiscoveryStore, FleetDescription, Instance,
    InstanceHealth, LifecycleState, LoadBalancerApi, Release, ReleaseCatalog, ScalingApi,
    StateRecord, TargetHealth, TargetState,
};
use crate::config::{EnvironmentConfig, RoutingConfig};
use crate::types::{
    Color, EnvironmentName, FleetId, InstanceId, ListenerId, RuleId, TargetId, Version,
};

/// A fleet as the simulation tracks it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetRecord {
    pub capacity: Capacity,
    /// Target the fleet's instances register with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetId>,
    /// Whether newly launched instances come up healthy.
    #[serde(default = "default_true")]
    pub launches_healthy: bool,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub launched: u64,
}

/// A listener default action or path rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecord {
    pub target: TargetId,
    /// Reject every update to this route.
    #[serde(default)]
    pub fail_updates: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetRecord {
    #[serde(default)]
    pub members: Vec<TargetHealth>,
}

/// The full simulated cloud, as persisted on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudDocument {
    #[serde(default)]
    pub fleets: BTreeMap<FleetId, FleetRecord>,
    #[serde(default)]
    pub listeners: BTreeMap<ListenerId, RouteRecord>,
    #[serde(default)]
    pub rules: BTreeMap<RuleId, RouteRecord>,
    #[serde(default)]
    pub targets: BTreeMap<TargetId, TargetRecord>,
    #[serde(default)]
    pub states: BTreeMap<EnvironmentName, StateRecord>,
    #[serde(default)]
    pub leases: BTreeMap<EnvironmentName, String>,
    /// Environment name to versions with a discovery artifact.
    #[serde(default)]
    pub discovery: BTreeMap<EnvironmentName, BTreeSet<Version>>,
    #[serde(default)]
    pub releases: Vec<Release>,
    /// Keyed by `<env>/<color>`.
    #[serde(default)]
    pub assignments: BTreeMap<String, Version>,
}

fn default_true() -> bool {
    true
}

fn assignment_key(env: &EnvironmentName, color: Color) -> String {
    format!("{env}/{color}")
}

impl CloudDocument {
    /// Register a fleet fronted by `target`, launching instances for `capacity.desired`.
    pub fn add_fleet(&mut self, fleet: FleetId, capacity: Capacity, target: TargetId) {
        self.targets.entry(target.clone()).or_default();
        self.fleets.insert(
            fleet.clone(),
            FleetRecord {
                capacity,
                target: Some(target),
                launches_healthy: true,
                instances: Vec::new(),
                launched: 0,
            },
        );
        self.reconcile(&fleet);
    }

    pub fn add_listener(&mut self, listener: ListenerId, target: TargetId) {
        self.listeners.insert(
            listener,
            RouteRecord {
                target,
                fail_updates: false,
            },
        );
    }

    pub fn add_rule(&mut self, rule: RuleId, target: TargetId) {
        self.rules.insert(
            rule,
            RouteRecord {
                target,
                fail_updates: false,
            },
        );
    }

    pub fn add_release(&mut self, version: Version, branch: &str) {
        self.releases.push(Release {
            version,
            branch: branch.to_string(),
            created_at: Utc::now(),
        });
    }

    pub fn assign_version(&mut self, env: &EnvironmentName, color: Color, version: Version) {
        self.assignments.insert(assignment_key(env, color), version);
    }

    pub fn add_discovery_artifact(&mut self, env: &EnvironmentName, version: Version) {
        self.discovery.entry(env.clone()).or_default().insert(version);
    }

    pub fn set_state(&mut self, env: &EnvironmentName, color: Color, target: &TargetId) {
        self.states.insert(
            env.clone(),
            StateRecord {
                active_color: Some(color.to_string()),
                active_target: Some(target.to_string()),
            },
        );
    }

    /// Seed fleets, targets, routes and state for one configured environment.
    /// Blue starts active with one instance; green starts empty.
    pub fn seed_environment(&mut self, env: &EnvironmentName, config: &EnvironmentConfig) {
        let ceiling = config.capacity_ceiling;
        let blue = config.color(Color::Blue);
        let green = config.color(Color::Green);
        self.add_fleet(
            blue.fleet.clone(),
            Capacity::new(1, 1, ceiling),
            blue.target.clone(),
        );
        self.add_fleet(
            green.fleet.clone(),
            Capacity::new(0, 0, ceiling),
            green.target.clone(),
        );
        match &config.routing {
            RoutingConfig::Rule { rule } => self.add_rule(rule.clone(), blue.target.clone()),
            RoutingConfig::DefaultAction { listeners } => {
                for listener in listeners.iter() {
                    self.add_listener(listener.clone(), blue.target.clone());
                }
            }
        }
        self.set_state(env, Color::Blue, &blue.target);
    }

    /// Launch or terminate instances so the fleet matches its desired capacity.
    fn reconcile(&mut self, fleet: &FleetId) {
        let Some(record) = self.fleets.get_mut(fleet) else {
            return;
        };
        let desired = record.capacity.desired as usize;
        let mut registered = Vec::new();
        let mut deregistered = Vec::new();

        while record.instances.len() < desired {
            record.launched += 1;
            let id = InstanceId::new(format!("{}-i{:04}", fleet, record.launched));
            let (lifecycle, health) = if record.launches_healthy {
                (LifecycleState::InService, InstanceHealth::Healthy)
            } else {
                (LifecycleState::Pending, InstanceHealth::Unhealthy)
            };
            record.instances.push(Instance {
                id: id.clone(),
                lifecycle,
                health,
            });
            registered.push((id, record.launches_healthy));
        }
        while record.instances.len() > desired {
            if let Some(instance) = record.instances.pop() {
                deregistered.push(instance.id);
            }
        }

        let Some(target) = record.target.clone() else {
            return;
        };
        let members = &mut self.targets.entry(target).or_default().members;
        members.retain(|m| !deregistered.contains(&m.instance));
        for (instance, healthy) in registered {
            let (state, reason) = if healthy {
                (TargetState::Healthy, None)
            } else {
                (
                    TargetState::Initial,
                    Some("Target.RegistrationInProgress".to_string()),
                )
            };
            members.push(TargetHealth {
                instance,
                state,
                reason,
            });
        }
    }

    fn route_mut<'a, K: Ord>(
        routes: &'a mut BTreeMap<K, RouteRecord>,
        key: &K,
        not_found: impl FnOnce() -> CloudError,
    ) -> Result<&'a mut RouteRecord, CloudError> {
        routes.get_mut(key).ok_or_else(not_found)
    }
}

/// In-memory cloud shared by every collaborator trait.
///
/// When opened from a file, every mutation rewrites the document so separate
/// CLI invocations observe each other's changes.
#[derive(Debug)]
pub struct SimulatedCloud {
    document: Mutex<CloudDocument>,
    path: Option<PathBuf>,
}

impl SimulatedCloud {
    pub fn in_memory(document: CloudDocument) -> Self {
        Self {
            document: Mutex::new(document),
            path: None,
        }
    }

    /// Load the document at `path`, starting empty if it does not exist yet.
    pub fn open(path: &Path) -> Result<Self, CloudError> {
        let document = if path.exists() {
            let content = std::fs::read_to_string(path).context(ReadSnafu { path })?;
            serde_json::from_str(&content).context(DecodeSnafu { path })?
        } else {
            CloudDocument::default()
        };
        Ok(Self {
            document: Mutex::new(document),
            path: Some(path.to_path_buf()),
        })
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> CloudDocument {
        self.document.lock().clone()
    }

    /// Apply a change to the document outside the trait surface (seeding, fault injection).
    pub fn edit<R>(&self, f: impl FnOnce(&mut CloudDocument) -> R) -> Result<R, CloudError> {
        self.mutate(|doc| Ok(f(doc)))
    }

    fn read<R>(&self, f: impl FnOnce(&CloudDocument) -> Result<R, CloudError>) -> Result<R, CloudError> {
        f(&self.document.lock())
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut CloudDocument) -> Result<R, CloudError>,
    ) -> Result<R, CloudError> {
        let mut document = self.document.lock();
        let result = f(&mut document)?;
        if let Some(path) = &self.path {
            persist(path, &document)?;
        }
        Ok(result)
    }
}

/// Write via a temporary sibling and rename so readers never see a torn file.
fn persist(path: &Path, document: &CloudDocument) -> Result<(), CloudError> {
    let json = serde_json::to_string_pretty(document).context(EncodeSnafu)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(WriteSnafu { path })?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).context(WriteSnafu { path: &tmp })?;
    std::fs::rename(&tmp, path).context(WriteSnafu { path })?;
    Ok(())
}

#[async_trait]
impl ScalingApi for SimulatedCloud {
    async fn describe_fleet(&self, fleet: &FleetId) -> Result<FleetDescription, CloudError> {
        self.read(|doc| {
            let record = doc.fleets.get(fleet).ok_or_else(|| CloudError::FleetNotFound {
                fleet: fleet.to_string(),
            })?;
            Ok(FleetDescription {
                fleet: fleet.clone(),
                capacity: record.capacity,
                instances: record.instances.clone(),
            })
        })
    }

    async fn update_capacity(
        &self,
        fleet: &FleetId,
        capacity: Capacity,
    ) -> Result<(), CloudError> {
        if !capacity.is_ordered() {
            return Err(CloudError::rejected(
                "update-capacity",
                format!("capacity out of order ({capacity})"),
            ));
        }
        self.mutate(|doc| {
            let record = doc
                .fleets
                .get_mut(fleet)
                .ok_or_else(|| CloudError::FleetNotFound {
                    fleet: fleet.to_string(),
                })?;
            record.capacity = capacity;
            doc.reconcile(fleet);
            Ok(())
        })
    }
}

#[async_trait]
impl LoadBalancerApi for SimulatedCloud {
    async fn listener_target(&self, listener: &ListenerId) -> Result<TargetId, CloudError> {
        self.read(|doc| {
            doc.listeners
                .get(listener)
                .map(|r| r.target.clone())
                .ok_or_else(|| CloudError::ListenerNotFound {
                    listener: listener.to_string(),
                })
        })
    }

    async fn set_listener_target(
        &self,
        listener: &ListenerId,
        target: &TargetId,
    ) -> Result<(), CloudError> {
        self.mutate(|doc| {
            if !doc.targets.contains_key(target) {
                return Err(CloudError::TargetNotFound {
                    target: target.to_string(),
                });
            }
            let route = CloudDocument::route_mut(&mut doc.listeners, listener, || {
                CloudError::ListenerNotFound {
                    listener: listener.to_string(),
                }
            })?;
            if route.fail_updates {
                return Err(CloudError::rejected(
                    "modify-listener",
                    format!("listener {listener} is not accepting changes"),
                ));
            }
            route.target = target.clone();
            Ok(())
        })
    }

    async fn rule_target(&self, rule: &RuleId) -> Result<TargetId, CloudError> {
        self.read(|doc| {
            doc.rules
                .get(rule)
                .map(|r| r.target.clone())
                .ok_or_else(|| CloudError::RuleNotFound {
                    rule: rule.to_string(),
                })
        })
    }

    async fn set_rule_target(&self, rule: &RuleId, target: &TargetId) -> Result<(), CloudError> {
        self.mutate(|doc| {
            if !doc.targets.contains_key(target) {
                return Err(CloudError::TargetNotFound {
                    target: target.to_string(),
                });
            }
            let route = CloudDocument::route_mut(&mut doc.rules, rule, || {
                CloudError::RuleNotFound {
                    rule: rule.to_string(),
                }
            })?;
            if route.fail_updates {
                return Err(CloudError::rejected(
                    "modify-rule",
                    format!("rule {rule} is not accepting changes"),
                ));
            }
            route.target = target.clone();
            Ok(())
        })
    }

    async fn target_health(&self, target: &TargetId) -> Result<Vec<TargetHealth>, CloudError> {
        self.read(|doc| {
            doc.targets
                .get(target)
                .map(|t| t.members.clone())
                .ok_or_else(|| CloudError::TargetNotFound {
                    target: target.to_string(),
                })
        })
    }

    async fn target_exists(&self, target: &TargetId) -> Result<bool, CloudError> {
        self.read(|doc| Ok(doc.targets.contains_key(target)))
    }
}

#[async_trait]
impl ColorStateStore for SimulatedCloud {
    async fn load(&self, env: &EnvironmentName) -> Result<Option<StateRecord>, CloudError> {
        self.read(|doc| Ok(doc.states.get(env).cloned()))
    }

    async fn save(&self, env: &EnvironmentName, record: &StateRecord) -> Result<(), CloudError> {
        self.mutate(|doc| {
            doc.states.insert(env.clone(), record.clone());
            Ok(())
        })
    }

    async fn create_lease(
        &self,
        env: &EnvironmentName,
        record: &str,
    ) -> Result<bool, CloudError> {
        self.mutate(|doc| {
            if doc.leases.contains_key(env) {
                return Ok(false);
            }
            doc.leases.insert(env.clone(), record.to_string());
            Ok(true)
        })
    }

    async fn read_lease(&self, env: &EnvironmentName) -> Result<Option<String>, CloudError> {
        self.read(|doc| Ok(doc.leases.get(env).cloned()))
    }

    async fn remove_lease(&self, env: &EnvironmentName) -> Result<(), CloudError> {
        self.mutate(|doc| {
            doc.leases.remove(env);
            Ok(())
        })
    }
}

#[async_trait]
impl ReleaseCatalog for SimulatedCloud {
    async fn list_releases(&self, branch: Option<&str>) -> Result<Vec<Release>, CloudError> {
        self.read(|doc| {
            let mut releases: Vec<Release> = doc
                .releases
                .iter()
                .filter(|r| branch.is_none_or(|b| r.branch == b))
                .cloned()
                .collect();
            // Later entries win ties on the timestamp.
            releases.reverse();
            releases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(releases)
        })
    }

    async fn assigned_version(
        &self,
        env: &EnvironmentName,
        color: Color,
    ) -> Result<Option<Version>, CloudError> {
        self.read(|doc| Ok(doc.assignments.get(&assignment_key(env, color)).cloned()))
    }

    async fn assign_version(
        &self,
        env: &EnvironmentName,
        color: Color,
        version: &Version,
    ) -> Result<(), CloudError> {
        self.mutate(|doc| {
            if !doc.releases.iter().any(|r| &r.version == version) {
                return Err(CloudError::ReleaseNotFound {
                    version: version.to_string(),
                });
            }
            doc.assignments
                .insert(assignment_key(env, color), version.clone());
            Ok(())
        })
    }
}

#[async_trait]
impl DiscoveryStore for SimulatedCloud {
    async fn artifact_exists(
        &self,
        env: &EnvironmentName,
        version: &Version,
    ) -> Result<bool, CloudError> {
        self.read(|doc| {
            Ok(doc
                .discovery
                .get(env)
                .is_some_and(|versions| versions.contains(version)))
        })
    }

    async fn copy_artifact(
        &self,
        from: &EnvironmentName,
        to: &EnvironmentName,
        version: &Version,
    ) -> Result<(), CloudError> {
        self.mutate(|doc| {
            let present = doc
                .discovery
                .get(from)
                .is_some_and(|versions| versions.contains(version));
            if !present {
                return Err(CloudError::rejected(
                    "copy-discovery",
                    format!("no discovery artifact for {version} in {from}"),
                ));
            }
            doc.discovery
                .entry(to.clone())
                .or_default()
                .insert(version.clone());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> SimulatedCloud {
        let mut doc = CloudDocument::default();
        doc.add_fleet(
            FleetId::new("beta-blue"),
            Capacity::new(2, 1, 4),
            TargetId::new("tg-blue"),
        );
        SimulatedCloud::in_memory(doc)
    }

    #[tokio::test]
    async fn scaling_launches_and_registers_instances() {
        let cloud = cloud();
        let fleet = FleetId::new("beta-blue");

        let desc = cloud.describe_fleet(&fleet).await.unwrap();
        assert_eq!(desc.instances.len(), 2);
        assert!(desc.instances.iter().all(Instance::is_serving));

        cloud
            .update_capacity(&fleet, Capacity::new(3, 0, 4))
            .await
            .unwrap();
        let members = cloud.target_health(&TargetId::new("tg-blue")).await.unwrap();
        assert_eq!(members.len(), 3);

        cloud
            .update_capacity(&fleet, Capacity::new(0, 0, 4))
            .await
            .unwrap();
        let members = cloud.target_health(&TargetId::new("tg-blue")).await.unwrap();
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn out_of_order_capacity_is_rejected() {
        let cloud = cloud();
        let err = cloud
            .update_capacity(&FleetId::new("beta-blue"), Capacity::new(5, 0, 4))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), super::super::CloudErrorKind::Rejected);
    }

    #[tokio::test]
    async fn lease_is_put_if_absent() {
        let cloud = cloud();
        let env = EnvironmentName::new("beta").unwrap();
        assert!(cloud.create_lease(&env, "first").await.unwrap());
        assert!(!cloud.create_lease(&env, "second").await.unwrap());
        assert_eq!(cloud.read_lease(&env).await.unwrap().as_deref(), Some("first"));
        cloud.remove_lease(&env).await.unwrap();
        assert!(cloud.read_lease(&env).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn document_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.json");
        let env = EnvironmentName::new("beta").unwrap();

        let cloud = SimulatedCloud::open(&path).unwrap();
        cloud
            .save(
                &env,
                &StateRecord {
                    active_color: Some("green".to_string()),
                    active_target: Some("tg-green".to_string()),
                },
            )
            .await
            .unwrap();

        let reopened = SimulatedCloud::open(&path).unwrap();
        let record = reopened.load(&env).await.unwrap().unwrap();
        assert_eq!(record.active_color.as_deref(), Some("green"));
    }
}
