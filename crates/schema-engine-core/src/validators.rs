//! Validator registry — maps a target type to a semantic validator invoked
//! after structural JSON-Schema validation succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::EngineResult;
use crate::types::{FieldMetadata, TargetType};

/// A validator's verdict: `Ok(true)` means valid; `Ok(false)` carries the
/// reason. Exceptions (the `Err` case) are caught at the call site and
/// reported as a `ValidatorError` tied to the field's dotted path.
pub type ValidatorFn = dyn Fn(&Value, Option<&FieldMetadata>) -> EngineResult<(bool, String)> + Send + Sync;

/// Two-map overlay, same shape as the other registries. Default validators
/// ignore the `FieldMetadata` argument (the original engine's "global
/// validator" signature is `(engine, value)`); instance validators may use
/// it (the original's "instance validator" signature is
/// `(engine, value, field_metadata)`). Unifying both under one `Fn` type
/// keeps the registry homogeneous without losing either call shape: default
/// validators simply don't read the second argument.
#[derive(Clone)]
pub struct ValidatorRegistry {
    default: HashMap<TargetType, Arc<ValidatorFn>>,
    instance: HashMap<TargetType, Arc<ValidatorFn>>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ValidatorRegistry {
    pub fn with_defaults() -> Self {
        let mut default: HashMap<TargetType, Arc<ValidatorFn>> = HashMap::new();
        default.insert(TargetType::Date, Arc::new(|v, _| date_validator(v)));
        default.insert(TargetType::Datetime, Arc::new(|v, _| datetime_validator(v)));
        default.insert(TargetType::SingleSelect, Arc::new(|_v, _| Ok((true, String::new()))));
        default.insert(TargetType::MultipleSelect, Arc::new(|_v, _| Ok((true, String::new()))));

        Self {
            default,
            instance: HashMap::new(),
        }
    }

    pub fn register(&mut self, target_type: TargetType, f: Arc<ValidatorFn>) {
        self.instance.insert(target_type, f);
    }

    pub fn resolve(&self, target_type: TargetType) -> Option<&Arc<ValidatorFn>> {
        self.instance
            .get(&target_type)
            .or_else(|| self.default.get(&target_type))
    }
}

fn date_validator(value: &Value) -> EngineResult<(bool, String)> {
    let Some(s) = value.as_str() else {
        return Ok((false, format!("date must be a string, got {value}")));
    };
    if is_iso_date(s) {
        Ok((true, String::new()))
    } else {
        Ok((false, format!("invalid ISO date format: {s}")))
    }
}

fn datetime_validator(value: &Value) -> EngineResult<(bool, String)> {
    let Some(s) = value.as_str() else {
        return Ok((false, format!("datetime must be a string, got {value}")));
    };
    if is_iso_datetime(s) {
        Ok((true, String::new()))
    } else {
        Ok((false, format!("invalid ISO datetime format: {s}")))
    }
}

/// `YYYY-MM-DD`, rejecting out-of-range months/days.
fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let Ok(year) = s[0..4].parse::<u32>() else { return false };
    let Ok(month) = s[5..7].parse::<u32>() else { return false };
    let Ok(day) = s[8..10].parse::<u32>() else { return false };
    let _ = year;
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// ISO date-time, accepting a trailing `Z` in place of an explicit offset
/// (mirrors the original's `value.replace("Z", "+00:00")` handling).
fn is_iso_datetime(s: &str) -> bool {
    let Some((date_part, time_part)) = s.split_once('T') else {
        return false;
    };
    if !is_iso_date(date_part) {
        return false;
    }
    let time_part = time_part.strip_suffix('Z').unwrap_or(time_part);
    let time_core = time_part
        .split(['+', '-'])
        .next()
        .unwrap_or(time_part);
    let segments: Vec<&str> = time_core.split(':').collect();
    if segments.len() < 2 {
        return false;
    }
    let Ok(hour) = segments[0].parse::<u32>() else { return false };
    let Ok(minute) = segments[1].parse::<u32>() else { return false };
    let second_ok = segments
        .get(2)
        .map(|s| s.split('.').next().unwrap_or(s).parse::<u32>().map(|s| s < 60).unwrap_or(false))
        .unwrap_or(true);
    hour < 24 && minute < 60 && second_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_iso_date_passes() {
        let (ok, _) = date_validator(&json!("2026-07-28")).unwrap();
        assert!(ok);
    }

    #[test]
    fn invalid_month_fails() {
        let (ok, err) = date_validator(&json!("2026-13-01")).unwrap();
        assert!(!ok);
        assert!(err.contains("Invalid") || err.contains("invalid"));
    }

    #[test]
    fn non_string_date_fails() {
        let (ok, _) = date_validator(&json!(42)).unwrap();
        assert!(!ok);
    }

    #[test]
    fn valid_datetime_with_z_suffix_passes() {
        let (ok, _) = datetime_validator(&json!("2026-07-28T10:30:00Z")).unwrap();
        assert!(ok);
    }

    #[test]
    fn valid_datetime_with_offset_passes() {
        let (ok, _) = datetime_validator(&json!("2026-07-28T10:30:00+05:00")).unwrap();
        assert!(ok);
    }

    #[test]
    fn invalid_datetime_missing_time_fails() {
        let (ok, _) = datetime_validator(&json!("2026-07-28")).unwrap();
        assert!(!ok);
    }

    #[test]
    fn single_select_default_is_structural_no_op() {
        let reg = ValidatorRegistry::with_defaults();
        let f = reg.resolve(TargetType::SingleSelect).unwrap();
        let (ok, _) = f(&json!("anything"), None).unwrap();
        assert!(ok);
    }

    #[test]
    fn instance_validator_shadows_default() {
        let mut reg = ValidatorRegistry::with_defaults();
        reg.register(TargetType::Date, Arc::new(|_v, _m| Ok((false, "always fails".to_string()))));
        let f = reg.resolve(TargetType::Date).unwrap();
        let (ok, msg) = f(&json!("2026-07-28"), None).unwrap();
        assert!(!ok);
        assert_eq!(msg, "always fails");
    }
}
