// ABOUTME: Fleet capacity controller for one environment's two colors.
// ABOUTME: Keeps min <= desired <= max, enforces the capacity ceiling, and freezes/restores bounds.

mod error;
mod snapshot;

pub use error::{CapacityError, FleetError};
pub use snapshot::{ProtectionHandle, ProtectionSnapshot, ScopeOutcome, protected};

use crate::cloud::{Capacity, Instance, ScalingApi};
use crate::config::EnvironmentConfig;
use crate::types::{Color, FleetId};

/// Partial capacity change. Unset fields keep their current value unless
/// they must move to keep the bounds ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityRequest {
    pub desired: Option<u32>,
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl CapacityRequest {
    pub fn desired(desired: u32) -> Self {
        Self {
            desired: Some(desired),
            ..Self::default()
        }
    }

    pub fn exact(capacity: Capacity) -> Self {
        Self {
            desired: Some(capacity.desired),
            min: Some(capacity.min),
            max: Some(capacity.max),
        }
    }

    /// Combine with the current capacity, widening unset bounds as needed.
    pub fn resolve(&self, current: Capacity, ceiling: u32) -> Result<Capacity, CapacityError> {
        for (field, value) in [("desired", self.desired), ("max", self.max)] {
            if let Some(requested) = value
                && requested > ceiling
            {
                return Err(CapacityError::ExceedsCeiling {
                    field,
                    requested,
                    ceiling,
                });
            }
        }

        let pairs = [
            ("min", self.min, "desired", self.desired),
            ("desired", self.desired, "max", self.max),
            ("min", self.min, "max", self.max),
        ];
        for (low_name, low, high_name, high) in pairs {
            if let (Some(low), Some(high)) = (low, high)
                && low > high
            {
                return Err(CapacityError::Inconsistent(format!(
                    "{low_name} {low} is greater than {high_name} {high}"
                )));
            }
        }

        let mut next = current;
        if let Some(desired) = self.desired {
            next.desired = desired;
        }
        if let Some(min) = self.min {
            next.min = min;
        }
        if let Some(max) = self.max {
            next.max = max;
        }

        if self.desired.is_some() {
            if self.min.is_none() {
                next.min = next.min.min(next.desired);
            }
            if self.max.is_none() {
                next.max = next.max.max(next.desired);
            }
        }
        if self.min.is_some() {
            if self.desired.is_none() {
                next.desired = next.desired.max(next.min);
            }
            if self.max.is_none() {
                next.max = next.max.max(next.min);
            }
        }
        if self.max.is_some() {
            if self.desired.is_none() {
                next.desired = next.desired.min(next.max);
            }
            if self.min.is_none() {
                next.min = next.min.min(next.max);
            }
        }

        if !next.is_ordered() {
            return Err(CapacityError::Inconsistent(format!(
                "cannot order {next} from current {current}"
            )));
        }
        if next.max > ceiling && self.max.is_none() && next.max != current.max {
            return Err(CapacityError::ExceedsCeiling {
                field: "max",
                requested: next.max,
                ceiling,
            });
        }
        Ok(next)
    }
}

/// Capacity operations for the fleets of one environment.
pub struct FleetController<'a> {
    scaling: &'a dyn ScalingApi,
    env: &'a EnvironmentConfig,
}

impl<'a> FleetController<'a> {
    pub fn new(scaling: &'a dyn ScalingApi, env: &'a EnvironmentConfig) -> Self {
        Self { scaling, env }
    }

    pub fn fleet(&self, color: Color) -> &FleetId {
        &self.env.color(color).fleet
    }

    pub async fn get_capacity(&self, color: Color) -> Result<Capacity, FleetError> {
        let description = self
            .scaling
            .describe_fleet(self.fleet(color))
            .await
            .map_err(|source| FleetError::Cloud {
                operation: "describe",
                color,
                source,
            })?;
        Ok(description.capacity)
    }

    /// Apply a capacity change. Returns the capacity now in effect; a request
    /// that changes nothing makes no API call.
    pub async fn set_capacity(
        &self,
        color: Color,
        request: CapacityRequest,
    ) -> Result<Capacity, FleetError> {
        let current = self.get_capacity(color).await?;
        let next = request.resolve(current, self.env.capacity_ceiling)?;
        if next == current {
            tracing::debug!(%color, capacity = %current, "capacity already in place");
            return Ok(current);
        }
        self.write(color, next).await?;
        tracing::info!(%color, from = %current, to = %next, "capacity updated");
        Ok(next)
    }

    /// Freeze the fleet at its current desired size and return its prior bounds.
    pub async fn protect(&self, color: Color) -> Result<ProtectionSnapshot, FleetError> {
        let current = self.get_capacity(color).await?;
        let snapshot =
            ProtectionSnapshot::new(color, self.fleet(color).clone(), current.min, current.max);
        let frozen = Capacity::new(current.desired, current.desired, current.desired);
        if frozen != current {
            self.write(color, frozen).await?;
        }
        tracing::info!(%color, min = current.min, max = current.max, "fleet protected");
        Ok(snapshot)
    }

    /// Put back the bounds recorded in `snapshot`. A consumed snapshot is a no-op.
    /// Returns whether anything was restored.
    pub async fn restore(&self, snapshot: &mut ProtectionSnapshot) -> Result<bool, FleetError> {
        if snapshot.is_consumed() {
            return Ok(false);
        }
        let color = snapshot.color;
        let current = self.get_capacity(color).await?;
        let restored = Capacity::new(
            current.desired.clamp(snapshot.min, snapshot.max),
            snapshot.min,
            snapshot.max,
        );
        if restored != current {
            self.write(color, restored).await?;
        }
        snapshot.mark_consumed();
        tracing::info!(%color, min = snapshot.min, max = snapshot.max, "fleet protection restored");
        Ok(true)
    }

    pub async fn list_instances(&self, color: Color) -> Result<Vec<Instance>, FleetError> {
        let description = self
            .scaling
            .describe_fleet(self.fleet(color))
            .await
            .map_err(|source| FleetError::Cloud {
                operation: "describe",
                color,
                source,
            })?;
        Ok(description.instances)
    }

    /// Set min and desired to zero, leaving max untouched.
    pub async fn scale_to_zero(&self, color: Color) -> Result<Capacity, FleetError> {
        self.set_capacity(
            color,
            CapacityRequest {
                desired: Some(0),
                min: Some(0),
                max: None,
            },
        )
        .await
    }

    async fn write(&self, color: Color, capacity: Capacity) -> Result<(), FleetError> {
        self.scaling
            .update_capacity(self.fleet(color), capacity)
            .await
            .map_err(|source| FleetError::Cloud {
                operation: "update capacity",
                color,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cap(desired: u32, min: u32, max: u32) -> Capacity {
        Capacity::new(desired, min, max)
    }

    #[test]
    fn desired_widens_unset_bounds() {
        let next = CapacityRequest::desired(5).resolve(cap(1, 1, 2), 8).unwrap();
        assert_eq!(next, cap(5, 1, 5));

        let next = CapacityRequest::desired(0).resolve(cap(2, 2, 4), 8).unwrap();
        assert_eq!(next, cap(0, 0, 4));
    }

    #[test]
    fn max_above_ceiling_is_rejected() {
        let request = CapacityRequest {
            max: Some(9),
            ..Default::default()
        };
        assert!(matches!(
            request.resolve(cap(1, 1, 2), 8),
            Err(CapacityError::ExceedsCeiling { field: "max", .. })
        ));
        assert!(matches!(
            CapacityRequest::desired(9).resolve(cap(1, 1, 2), 8),
            Err(CapacityError::ExceedsCeiling {
                field: "desired",
                ..
            })
        ));
    }

    #[test]
    fn contradictory_request_is_rejected() {
        let request = CapacityRequest {
            desired: Some(3),
            min: Some(4),
            max: None,
        };
        assert!(matches!(
            request.resolve(cap(1, 1, 8), 8),
            Err(CapacityError::Inconsistent(_))
        ));
    }

    #[test]
    fn lowering_max_pulls_desired_and_min_down() {
        let request = CapacityRequest {
            max: Some(2),
            ..Default::default()
        };
        assert_eq!(request.resolve(cap(4, 3, 6), 8).unwrap(), cap(2, 2, 2));
    }

    proptest! {
        #[test]
        fn resolved_capacity_is_always_ordered(
            current_desired in 0u32..8,
            desired in proptest::option::of(0u32..10),
            min in proptest::option::of(0u32..10),
            max in proptest::option::of(0u32..10),
        ) {
            let current = cap(current_desired, 0, 8);
            let request = CapacityRequest { desired, min, max };
            if let Ok(next) = request.resolve(current, 8) {
                prop_assert!(next.is_ordered());
                prop_assert!(max.is_none_or(|m| next.max == m));
                prop_assert!(desired.is_none_or(|d| next.desired == d));
            }
        }
    }
}
