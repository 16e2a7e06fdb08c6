//! Single-instance component factory.

use super::camera::DepthCamera;
use super::ComponentError;
use crate::config::SensorConfig;
use crate::publish::FrameSink;
use crate::sensor::SensorDriver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Live components a factory will hand out at once.
pub const MAX_INSTANCES: usize = 1;

/// Holds the factory's instance slot until dropped.
#[derive(Debug)]
pub struct InstanceGuard {
    live: Arc<AtomicBool>,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.live.store(false, Ordering::Release);
        tracing::debug!("Component instance slot released");
    }
}

/// Creates components, refusing a second one while the first is alive.
#[derive(Debug, Default, Clone)]
pub struct ComponentFactory {
    live: Arc<AtomicBool>,
}

impl ComponentFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a component created by this factory exists.
    pub fn has_live_instance(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Reserves the instance slot.
    pub fn acquire(&self) -> Result<InstanceGuard, ComponentError> {
        self.live
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ComponentError::InstanceLimit { max: MAX_INSTANCES })?;
        Ok(InstanceGuard {
            live: Arc::clone(&self.live),
        })
    }

    /// Creates a component that owns the instance slot.
    pub fn create<D, S>(
        &self,
        config: SensorConfig,
        driver: D,
        sink: S,
    ) -> Result<DepthCamera<D, S>, ComponentError>
    where
        D: SensorDriver,
        S: FrameSink,
    {
        let guard = self.acquire()?;
        Ok(DepthCamera::new(config, driver, sink).with_instance_guard(guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::MemorySink;
    use crate::sensor::MockDriver;

    #[test]
    fn test_second_instance_refused() {
        let factory = ComponentFactory::new();
        let first = factory
            .create(SensorConfig::default(), MockDriver::new(), MemorySink::new())
            .unwrap();
        assert!(factory.has_live_instance());

        let second = factory.create(SensorConfig::default(), MockDriver::new(), MemorySink::new());
        assert!(matches!(
            second,
            Err(ComponentError::InstanceLimit { max: 1 })
        ));

        drop(first);
        assert!(!factory.has_live_instance());
        assert!(factory
            .create(SensorConfig::default(), MockDriver::new(), MemorySink::new())
            .is_ok());
    }

    #[test]
    fn test_factories_are_independent() {
        let a = ComponentFactory::new();
        let b = ComponentFactory::new();
        let _guard = a.acquire().unwrap();
        assert!(b.acquire().is_ok());
    }
}
