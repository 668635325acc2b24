use ::config::{Config, ConfigError};

pub(crate) fn get_namespaced_value<T, F>(
    config: &Config,
    name: &str,
    key: &str,
    getter: F,
) -> Result<T, ConfigError>
where
    F: Fn(&Config, &str) -> Result<T, ConfigError>,
{
    if name.is_empty() {
        getter(config, key)
    } else {
        getter(config, &format!("{name}.{key}")).or_else(|_| getter(config, key))
    }
}

pub(crate) fn get_namespaced_usize(
    config: &Config,
    name: &str,
    key: &str,
) -> Result<usize, ConfigError> {
    get_namespaced_value(config, name, key, |cfg, key| cfg.get::<usize>(key))
}

/// Namespaced lookup that falls back to `default` when the key is absent but
/// still rejects keys that are present with an unusable value.
pub(crate) fn get_usize_with_default(
    config: &Config,
    name: &str,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match get_namespaced_usize(config, name, key) {
        Ok(value) => Ok(value),
        Err(ConfigError::NotFound(_)) => Ok(default),
        Err(err) => Err(err),
    }
}
