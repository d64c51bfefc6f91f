//! Runtime configuration parameters.
//!
//! All cache limits and representation thresholds are tunable. Defaults are
//! chosen for interpreter-only execution of typical object-heavy programs.

use thiserror::Error;

/// Configuration for property caches, shapes and array representations.
///
/// # Example
///
/// ```
/// use strata_core::RuntimeConfig;
///
/// // Tight polymorphism bound for testing megamorphic behavior
/// let config = RuntimeConfig {
///     property_cache_limit: 2,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    // =========================================================================
    // Inline Caches
    // =========================================================================
    /// Maximum number of specialized entries in a property cache chain.
    ///
    /// Observing one more distinct receiver class collapses the chain into a
    /// single generic entry for the rest of the call site's life.
    ///
    /// Default: 5
    pub property_cache_limit: usize,

    /// Maximum number of representation guards in an element cache chain.
    ///
    /// Default: 4
    pub element_cache_limit: usize,

    /// Maximum prototype depth that a cache entry will specialize over.
    ///
    /// Deeper chains are handled by the generic entry.
    ///
    /// Default: 32
    pub max_prototype_depth: usize,

    /// Use leaf assumptions instead of shape walks for prototype checks.
    ///
    /// Default: true
    pub prototype_assumptions: bool,

    // =========================================================================
    // Shapes & Locations
    // =========================================================================
    /// Object literals with more members than this are created directly in
    /// dictionary mode instead of walking shape transitions.
    ///
    /// Default: 64
    pub dictionary_object_threshold: usize,

    /// Allocate int/double/boolean/long locations for primitive values.
    ///
    /// When disabled every property lives in a generic object slot.
    ///
    /// Default: true
    pub typed_locations: bool,

    /// Track write-once properties so caches can fold them to constants.
    ///
    /// Default: true
    pub assumed_final_locations: bool,

    /// Obsolete the old shape subtree when a location is generalized, so that
    /// every object with the old layout migrates to the widened one.
    ///
    /// When disabled a memoized generalize transition is recorded instead and
    /// old shapes stay valid.
    ///
    /// Default: true
    pub obsolete_on_generalize: bool,

    // =========================================================================
    // Arrays
    // =========================================================================
    /// Writing this many slots past the end of a dense array switches it to
    /// the sparse representation.
    ///
    /// Default: 1024
    pub sparse_gap_threshold: u32,

    /// Dense arrays never grow beyond this length; larger indices go sparse.
    ///
    /// Default: 16M elements
    pub max_dense_length: u32,

    // =========================================================================
    // Extensions
    // =========================================================================
    /// Enable the `__noSuchProperty__` fallback for absent properties.
    ///
    /// Default: false
    pub no_such_property: bool,

    /// Enable host member resolution for embedded host objects.
    ///
    /// Default: false
    pub host_interop: bool,

    /// Enable dispatch to foreign (cross-language) objects.
    ///
    /// Default: true
    pub foreign_interop: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            // Inline caches
            property_cache_limit: 5,
            element_cache_limit: 4,
            max_prototype_depth: 32,
            prototype_assumptions: true,

            // Shapes
            dictionary_object_threshold: 64,
            typed_locations: true,
            assumed_final_locations: true,
            obsolete_on_generalize: true,

            // Arrays
            sparse_gap_threshold: 1024,
            max_dense_length: 1 << 24,

            // Extensions
            no_such_property: false,
            host_interop: false,
            foreign_interop: true,
        }
    }
}

impl RuntimeConfig {
    /// Configuration for embedders that expose host objects.
    pub fn with_host_interop() -> Self {
        Self {
            host_interop: true,
            no_such_property: true,
            ..Default::default()
        }
    }

    /// Configuration that disables speculation.
    ///
    /// Every location is generic and no assumption is relied upon; useful for
    /// checking that specialized and unspecialized paths agree.
    pub fn conservative() -> Self {
        Self {
            typed_locations: false,
            assumed_final_locations: false,
            prototype_assumptions: false,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.property_cache_limit == 0 {
            return Err(ConfigError::ZeroCacheLimit);
        }
        if self.element_cache_limit == 0 {
            return Err(ConfigError::ZeroCacheLimit);
        }
        if self.max_prototype_depth == 0 {
            return Err(ConfigError::ZeroPrototypeDepth);
        }
        if self.dictionary_object_threshold == 0 {
            return Err(ConfigError::ZeroDictionaryThreshold);
        }
        if self.max_dense_length < self.sparse_gap_threshold {
            return Err(ConfigError::DenseLengthBelowGap);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A cache limit of zero would never specialize.
    #[error("cache limits must be at least 1")]
    ZeroCacheLimit,
    /// Prototype depth must allow at least one link.
    #[error("max prototype depth must be at least 1")]
    ZeroPrototypeDepth,
    /// Dictionary threshold must be positive.
    #[error("dictionary object threshold must be at least 1")]
    ZeroDictionaryThreshold,
    /// Dense arrays must be allowed to grow past the sparse gap.
    #[error("max dense length must not be below the sparse gap threshold")]
    DenseLengthBelowGap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_preset_configs_are_valid() {
        assert!(RuntimeConfig::with_host_interop().validate().is_ok());
        assert!(RuntimeConfig::conservative().validate().is_ok());
    }

    #[test]
    fn test_zero_cache_limit() {
        let config = RuntimeConfig {
            property_cache_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCacheLimit));
    }

    #[test]
    fn test_dense_length_below_gap() {
        let config = RuntimeConfig {
            max_dense_length: 16,
            sparse_gap_threshold: 1024,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::DenseLengthBelowGap));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConfigError::ZeroCacheLimit.to_string(),
            "cache limits must be at least 1"
        );
    }
}
