//! Typed option structs for every marker attribute.
//!
//! Each marker has exactly one mapping function from the raw [`AttributeData`] argument list. The
//! function enumerates every recognized option with its default; anything else is an [`OptionError`].
//! Positional arguments map onto the option order listed in each function.

use derivgen_core::MarkerId;
use derivgen_syntax::TypeSyntax;
use derivgen_syntax::parser::parse_type;
use serde::Serialize;

use crate::host::{AttributeArg, AttributeData, AttributeValue};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("`{marker}` has no option named `{option}`")]
    UnknownOption { marker: &'static str, option: String },

    #[error("`{marker}` accepts at most {max} positional arguments")]
    TooManyArguments { marker: &'static str, max: usize },

    #[error("option `{option}` expects {expected}")]
    TypeMismatch { option: &'static str, expected: &'static str },

    #[error("option `{option}` is out of range: {value}")]
    OutOfRange { option: &'static str, value: i64 },

    #[error("option `{option}` has unknown value `{value}`")]
    UnknownValue { option: &'static str, value: String },
}

/// What to do when a second singleton instance is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SingletonStrategy {
    /// The newest instance wins.
    #[default]
    Replace,
    /// The existing instance stays registered.
    KeepExisting,
    /// Registration throws.
    Throw,
}

impl SingletonStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            SingletonStrategy::Replace => "Replace",
            SingletonStrategy::KeepExisting => "KeepExisting",
            SingletonStrategy::Throw => "Throw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TrackOptions {
    /// Registration is driven by `RegisterInstance`/`UnregisterInstance` instead of Unity messages.
    pub manual: bool,
    pub instance_id_array: bool,
    pub transform_access_array: bool,
    pub transform_initial_capacity: u32,
    pub transform_desired_job_count: i32,
    /// Cache `enabled` so `Count` skips disabled components without a native call.
    pub cache_enabled_state: bool,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            manual: false,
            instance_id_array: false,
            transform_access_array: false,
            transform_initial_capacity: 64,
            transform_desired_job_count: -1,
            cache_enabled_state: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SingletonOptions {
    pub manual: bool,
    pub strategy: SingletonStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct InjectOptions {
    /// Generated properties are `public` instead of `private`.
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct UnionOptions {
    /// Caller-forced type id.
    pub id: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UnionHeaderOptions {
    /// Dispatch interface (`typeof(IShape)`); defaults to an interface nested in the header.
    pub dispatch: Option<TypeSyntax>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UnmanagedAccessOptions {
    /// Null-check the owning object in every accessor.
    pub safety_checks: bool,
    pub include_private: bool,
}

impl Default for UnmanagedAccessOptions {
    fn default() -> Self {
        Self {
            safety_checks: false,
            include_private: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConstantsOptions {
    pub namespace: Option<String>,
    pub class_name: String,
}

impl Default for ConstantsOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            class_name: "Constants".to_string(),
        }
    }
}

/// Walks an argument list, pairing positional arguments with the option order.
struct Args<'a> {
    order: &'static [&'static str],
    args: &'a [AttributeArg],
}

impl<'a> Args<'a> {
    fn new(marker: MarkerId, order: &'static [&'static str], attr: &'a AttributeData) -> Result<Self, OptionError> {
        let marker = derivgen_core::vocab::markers::as_str(marker);
        let positional = attr.args.iter().filter(|a| a.name.is_none()).count();
        if positional > order.len() {
            return Err(OptionError::TooManyArguments {
                marker,
                max: order.len(),
            });
        }
        for arg in &attr.args {
            if let Some(name) = &arg.name {
                if !order.iter().any(|o| o.eq_ignore_ascii_case(name)) {
                    return Err(OptionError::UnknownOption {
                        marker,
                        option: name.clone(),
                    });
                }
            }
        }
        Ok(Self {
            order,
            args: &attr.args,
        })
    }

    /// Value for `option`: a named argument wins over the positional slot.
    fn get(&self, option: &str) -> Option<&'a AttributeValue> {
        let named = self
            .args
            .iter()
            .find(|a| a.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(option)));
        if let Some(arg) = named {
            return Some(&arg.value);
        }
        let slot = self.order.iter().position(|o| *o == option)?;
        self.args.iter().filter(|a| a.name.is_none()).nth(slot).map(|a| &a.value)
    }

    fn bool(&self, option: &'static str, default: bool) -> Result<bool, OptionError> {
        match self.get(option) {
            None => Ok(default),
            Some(AttributeValue::Bool(b)) => Ok(*b),
            Some(_) => Err(OptionError::TypeMismatch {
                option,
                expected: "a boolean",
            }),
        }
    }

    fn int(&self, option: &'static str) -> Result<Option<i64>, OptionError> {
        match self.get(option) {
            None => Ok(None),
            Some(AttributeValue::Int(v)) => Ok(Some(*v)),
            Some(_) => Err(OptionError::TypeMismatch {
                option,
                expected: "an integer",
            }),
        }
    }

    fn text(&self, option: &'static str) -> Result<Option<&'a str>, OptionError> {
        match self.get(option) {
            None => Ok(None),
            Some(AttributeValue::Text(t)) => Ok(Some(t.as_str())),
            Some(_) => Err(OptionError::TypeMismatch {
                option,
                expected: "a string",
            }),
        }
    }

    /// `typeof(T)` or a bare type name.
    fn type_of(&self, option: &'static str) -> Result<Option<TypeSyntax>, OptionError> {
        let Some(text) = self.text(option)? else {
            return Ok(None);
        };
        let inner = text
            .strip_prefix("typeof(")
            .and_then(|t| t.strip_suffix(')'))
            .unwrap_or(text);
        parse_type(inner).map(Some).map_err(|_| OptionError::TypeMismatch {
            option,
            expected: "a type",
        })
    }
}

fn in_range<T: TryFrom<i64>>(option: &'static str, value: i64) -> Result<T, OptionError> {
    T::try_from(value).map_err(|_| OptionError::OutOfRange { option, value })
}

pub fn track_options(attr: &AttributeData) -> Result<TrackOptions, OptionError> {
    const ORDER: &[&str] = &[
        "manual",
        "instanceIdArray",
        "transformAccessArray",
        "transformInitialCapacity",
        "transformDesiredJobCount",
        "cacheEnabledState",
    ];
    let args = Args::new(MarkerId::Track, ORDER, attr)?;
    let defaults = TrackOptions::default();
    Ok(TrackOptions {
        manual: args.bool("manual", defaults.manual)?,
        instance_id_array: args.bool("instanceIdArray", defaults.instance_id_array)?,
        transform_access_array: args.bool("transformAccessArray", defaults.transform_access_array)?,
        transform_initial_capacity: match args.int("transformInitialCapacity")? {
            Some(v) => in_range("transformInitialCapacity", v)?,
            None => defaults.transform_initial_capacity,
        },
        transform_desired_job_count: match args.int("transformDesiredJobCount")? {
            Some(v) => in_range("transformDesiredJobCount", v)?,
            None => defaults.transform_desired_job_count,
        },
        cache_enabled_state: args.bool("cacheEnabledState", defaults.cache_enabled_state)?,
    })
}

pub fn singleton_options(attr: &AttributeData) -> Result<SingletonOptions, OptionError> {
    const ORDER: &[&str] = &["strategy", "manual"];
    let args = Args::new(MarkerId::Singleton, ORDER, attr)?;
    let strategy = match args.text("strategy")? {
        None => SingletonStrategy::default(),
        Some(value) => {
            let member = value.rsplit('.').next().unwrap_or(value);
            match member {
                "Replace" | "AutoReplace" => SingletonStrategy::Replace,
                "KeepExisting" => SingletonStrategy::KeepExisting,
                "Throw" | "ThrowException" => SingletonStrategy::Throw,
                _ => {
                    return Err(OptionError::UnknownValue {
                        option: "strategy",
                        value: value.to_string(),
                    });
                }
            }
        }
    };
    Ok(SingletonOptions {
        manual: args.bool("manual", false)?,
        strategy,
    })
}

pub fn inject_options(attr: &AttributeData) -> Result<InjectOptions, OptionError> {
    let args = Args::new(MarkerId::Inject, &["public"], attr)?;
    Ok(InjectOptions {
        public: args.bool("public", false)?,
    })
}

pub fn union_options(attr: &AttributeData) -> Result<UnionOptions, OptionError> {
    let args = Args::new(MarkerId::Union, &["id"], attr)?;
    let id = match args.int("id")? {
        // 0 is the "unset" tag and can never be forced.
        Some(0) => return Err(OptionError::OutOfRange { option: "id", value: 0 }),
        Some(v) => Some(in_range::<u8>("id", v)?),
        None => None,
    };
    Ok(UnionOptions { id })
}

pub fn union_header_options(attr: &AttributeData) -> Result<UnionHeaderOptions, OptionError> {
    let args = Args::new(MarkerId::UnionHeader, &["dispatch"], attr)?;
    Ok(UnionHeaderOptions {
        dispatch: args.type_of("dispatch")?,
    })
}

pub fn unmanaged_access_options(attr: &AttributeData) -> Result<UnmanagedAccessOptions, OptionError> {
    let args = Args::new(MarkerId::UnmanagedAccess, &["safetyChecks", "includePrivate"], attr)?;
    let defaults = UnmanagedAccessOptions::default();
    Ok(UnmanagedAccessOptions {
        safety_checks: args.bool("safetyChecks", defaults.safety_checks)?,
        include_private: args.bool("includePrivate", defaults.include_private)?,
    })
}

pub fn constants_options(attr: &AttributeData) -> Result<ConstantsOptions, OptionError> {
    let args = Args::new(MarkerId::GenerateUnityConstants, &["namespace", "className"], attr)?;
    let defaults = ConstantsOptions::default();
    let class_name = match args.text("className")? {
        Some(name) => derivgen_core::idents::sanitize(name).ok_or_else(|| OptionError::UnknownValue {
            option: "className",
            value: name.to_string(),
        })?,
        None => defaults.class_name,
    };
    let namespace = args.text("namespace")?.filter(|ns| !ns.is_empty()).map(str::to_string);
    Ok(ConstantsOptions { namespace, class_name })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(json: &str) -> AttributeData {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_track_defaults() {
        let opts = track_options(&attr(r#"{ "name": "Track" }"#)).unwrap();
        assert_eq!(opts, TrackOptions::default());
        assert_eq!(opts.transform_initial_capacity, 64);
    }

    #[test]
    fn test_track_named_and_positional() {
        let opts = track_options(&attr(
            r#"{ "name": "Track", "args": [
                { "value": true },
                { "name": "transformAccessArray", "value": true },
                { "name": "TransformInitialCapacity", "value": 256 }
            ] }"#,
        ))
        .unwrap();
        assert!(opts.manual);
        assert!(opts.transform_access_array);
        assert_eq!(opts.transform_initial_capacity, 256);
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let err = track_options(&attr(r#"{ "name": "Track", "args": [{ "name": "bogus", "value": 1 }] }"#))
            .unwrap_err();
        assert_eq!(
            err,
            OptionError::UnknownOption {
                marker: "Track",
                option: "bogus".into()
            }
        );
    }

    #[test]
    fn test_type_mismatch() {
        let err = track_options(&attr(r#"{ "name": "Track", "args": [{ "value": "yes" }] }"#)).unwrap_err();
        assert!(matches!(err, OptionError::TypeMismatch { option: "manual", .. }));
    }

    #[test]
    fn test_singleton_strategy_accepts_qualified_enum_member() {
        let opts = singleton_options(&attr(
            r#"{ "name": "Singleton", "args": [{ "value": "SingletonStrategy.KeepExisting" }] }"#,
        ))
        .unwrap();
        assert_eq!(opts.strategy, SingletonStrategy::KeepExisting);
    }

    #[test]
    fn test_union_id_range() {
        assert_eq!(union_options(&attr(r#"{ "name": "Union", "args": [{ "value": 3 }] }"#)).unwrap().id, Some(3));
        assert!(matches!(
            union_options(&attr(r#"{ "name": "Union", "args": [{ "value": 0 }] }"#)),
            Err(OptionError::OutOfRange { value: 0, .. })
        ));
        assert!(matches!(
            union_options(&attr(r#"{ "name": "Union", "args": [{ "value": 300 }] }"#)),
            Err(OptionError::OutOfRange { value: 300, .. })
        ));
    }

    #[test]
    fn test_union_header_dispatch_typeof() {
        let opts =
            union_header_options(&attr(r#"{ "name": "UnionHeader", "args": [{ "value": "typeof(IShape)" }] }"#))
                .unwrap();
        assert_eq!(opts.dispatch.map(|t| t.name), Some("IShape".to_string()));
    }

    #[test]
    fn test_too_many_positional_arguments() {
        let err = inject_options(&attr(r#"{ "name": "Inject", "args": [{ "value": true }, { "value": true }] }"#))
            .unwrap_err();
        assert_eq!(err, OptionError::TooManyArguments { marker: "Inject", max: 1 });
    }

    #[test]
    fn test_constants_class_name_is_sanitized() {
        let opts = constants_options(&attr(
            r#"{ "name": "GenerateUnityConstants", "args": [{ "value": "Game" }, { "value": "Unity Constants" }] }"#,
        ))
        .unwrap();
        assert_eq!(opts.namespace.as_deref(), Some("Game"));
        assert_eq!(opts.class_name, "UnityConstants");
    }
}
