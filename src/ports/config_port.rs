//! Configuration access port trait.
//!
//! Strategy documents are INI-shaped: named sections holding scalar keys.
//! Numeric getters fall back to `default` when a key is absent or unparsable;
//! field validation catches out-of-range values afterwards.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
    fn has_section(&self, section: &str) -> bool;
}
