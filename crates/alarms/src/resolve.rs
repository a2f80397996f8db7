use models::config::{Overlay, Selector};

/// Resolve the configuration of a resource having `logical_id` and an
/// optional kind-specific `natural_name`. The first override entry which
/// selects the resource is overlaid onto a copy of `defaults`.
/// Later entries which also select it are ignored.
pub fn resolve<S, O>(defaults: &S, overrides: &[O], logical_id: &str, natural_name: Option<&str>) -> S
where
    S: Clone,
    O: Overlay<S> + Selector,
{
    let mut config = defaults.clone();

    if let Some(entry) = overrides
        .iter()
        .find(|entry| entry.selects(logical_id, natural_name))
    {
        tracing::debug!(%logical_id, ?natural_name, "applying override config");
        entry.overlay(&mut config);
    }
    config
}

#[cfg(test)]
mod test {
    use super::resolve;
    use models::config::{CountPatch, FunctionOverride, RatioPatch};
    use models::LambdaConfig;

    fn enabled_defaults() -> LambdaConfig {
        let mut defaults = LambdaConfig::default();
        defaults.error_rate.enabled = true;
        defaults.throttle_count.enabled = true;
        defaults
    }

    #[test]
    fn test_no_overrides_is_defaults() {
        let defaults = enabled_defaults();
        let out = resolve::<_, FunctionOverride>(&defaults, &[], "HelloFunction", Some("hello"));
        assert_eq!(out, defaults);
    }

    #[test]
    fn test_overlay_is_right_biased_and_deep() {
        let defaults = enabled_defaults();
        let overrides = vec![FunctionOverride {
            function_name: Some("hello".to_string()),
            error_rate: Some(RatioPatch {
                threshold: Some(0.2),
                ..Default::default()
            }),
            throttle_count: Some(CountPatch {
                enabled: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        }];

        let out = resolve(&defaults, &overrides, "HelloFunction", Some("hello"));

        let mut expect = defaults.clone();
        expect.error_rate.threshold = 0.2;
        expect.throttle_count.enabled = false;
        assert_eq!(out, expect);

        // A resource which isn't selected takes the defaults.
        let out = resolve(&defaults, &overrides, "WorldFunction", Some("world"));
        assert_eq!(out, defaults);
    }

    #[test]
    fn test_first_match_wins() {
        let defaults = enabled_defaults();
        let disable = |logical_id: Option<&str>, name: Option<&str>| FunctionOverride {
            logical_id: logical_id.map(str::to_string),
            function_name: name.map(str::to_string),
            error_rate: Some(RatioPatch {
                enabled: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut second = disable(Some("HelloFunction"), None);
        second.throttle_count = Some(CountPatch {
            enabled: Some(false),
            ..Default::default()
        });

        let overrides = vec![disable(None, Some("hello")), second];
        let out = resolve(&defaults, &overrides, "HelloFunction", Some("hello"));

        assert!(!out.error_rate.enabled);
        assert!(out.throttle_count.enabled);
    }
}
