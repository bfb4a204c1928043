//! Invocation order, exactly-once delivery, and discovery rounds.


use sprig_container::prelude::*;
use test_utils::{EventLog, Recording, widget, widget_container};

// ═══════════════════════════════════════════════════════════════════════════════
// ORDERING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn ordered_hooks_run_ascending_then_unordered_in_registration_order() {
    let log = EventLog::default();
    let mut container = Container::new();
    container
        .add_post_processors((
            Recording::new("u1", None, &log),
            Recording::new("p30", Some(30), &log),
            Recording::new("u2", None, &log),
            Recording::new("p-5", Some(-5), &log),
            Recording::new("p30b", Some(30), &log),
        ))
        .unwrap();

    container.refresh().unwrap();

    assert_eq!(log.hooks(), ["p-5", "p30", "p30b", "u1", "u2"]);
    assert_eq!(container.invoked_post_processors(), log.hooks());
}

#[test]
fn registration_priority_overrides_reported_priority() {
    let log = EventLog::default();
    let mut container = Container::new();
    container
        .add_post_processors(Recording::new("reports-1", Some(1), &log))
        .unwrap()
        .add_post_processor_with_priority(Recording::new("reports-100", Some(100), &log), 0)
        .unwrap();

    container.refresh().unwrap();

    assert_eq!(log.hooks(), ["reports-100", "reports-1"]);
}

#[test]
fn every_hook_runs_before_any_construction() {
    let log = EventLog::default();
    let mut container = widget_container(&log);
    container
        .register_descriptors([widget("a"), widget("b"), widget("c")])
        .unwrap();
    container
        .add_post_processors((
            Recording::new("first", Some(1), &log),
            Recording::new("second", None, &log),
        ))
        .unwrap();

    container.refresh().unwrap();

    let events = log.events();
    assert_eq!(
        events,
        ["hook:first", "hook:second", "new:a", "new:b", "new:c"]
    );
}

#[test]
fn mutations_are_visible_to_later_hooks() {
    let log = EventLog::default();
    let mut container = widget_container(&log);
    container.register_descriptor(widget("svc")).unwrap();
    container
        .add_post_processors((
            post_processor_fn("check", |view| {
                let svc = view.require_descriptor("svc")?;
                if svc.property("timeout") != Some(&Value::Int(30)) || !svc.lazy_init {
                    return Err(ConfigError::invalid("earlier mutation not visible"));
                }
                Ok(())
            }),
            post_processor_fn("mutate", |view| {
                let svc = view.require_descriptor_mut("svc")?;
                svc.set_property("timeout", 30);
                svc.lazy_init = true;
                Ok(())
            })
            .with_priority(0),
        ))
        .unwrap();

    container.refresh().unwrap();
    assert!(log.constructions().is_empty(), "lazy singleton built eagerly");
}

#[test]
fn hook_name_is_available_through_the_view() {
    let log = EventLog::default();
    let seen = log.clone();
    let mut container = Container::new();
    container
        .add_post_processors(post_processor_fn("introspective", move |view| {
            seen.push(view.current_processor());
            Ok(())
        }))
        .unwrap();

    container.refresh().unwrap();
    assert_eq!(log.events(), ["introspective"]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY ROUNDS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn hooks_registered_during_the_phase_run_in_the_next_round() {
    let log = EventLog::default();
    let inner = log.clone();
    let mut container = Container::new();
    container
        .add_post_processors((
            post_processor_fn("spawner", move |view| {
                view.register_post_processor(Recording::new("spawned-late", None, &inner));
                view.register_post_processor_with_priority(
                    Recording::new("spawned-early", None, &inner),
                    -1,
                );
                Ok(())
            }),
            Recording::new("sibling", None, &log),
        ))
        .unwrap();

    container.refresh().unwrap();

    assert_eq!(log.hooks(), ["sibling", "spawned-early", "spawned-late"]);
    assert_eq!(
        container.invoked_post_processors(),
        ["spawner", "sibling", "spawned-early", "spawned-late"]
    );
}

/// Registers a copy of itself every time it runs.
struct Replicator;

impl ContainerPostProcessor for Replicator {
    fn post_process(&self, view: &mut ContainerView<'_>) -> Result<(), ConfigError> {
        view.register_post_processor(Replicator);
        Ok(())
    }
}

#[test]
fn runaway_registration_hits_the_round_limit() {
    let mut container =
        Container::with_config(ContainerConfig::new().with_max_discovery_rounds(3));
    container.add_post_processors(Replicator).unwrap();

    let err = container.refresh().unwrap_err();

    assert!(matches!(
        err,
        ContainerError::DiscoveryLimitExceeded { rounds: 3 }
    ));
    assert_eq!(container.invoked_post_processors().len(), 3);
    assert_eq!(container.state(), ContainerState::Failed);
}

/// Hook built from a descriptor of type `Renamer`: renames the property named
/// by `from` to the one named by `to` on every widget.
struct Renamer {
    from: String,
    to: String,
}

impl ContainerPostProcessor for Renamer {
    fn post_process(&self, view: &mut ContainerView<'_>) -> Result<(), ConfigError> {
        for descriptor in view.descriptors_mut() {
            if let Some(value) = descriptor.remove_property(&self.from) {
                descriptor.set_property(self.to.clone(), value);
            }
        }
        Ok(())
    }
}

fn renamer_from(descriptor: &ComponentDescriptor) -> Result<Renamer, ConfigError> {
    let read = |name: &str| {
        descriptor
            .property(name)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ConfigError::MissingProperty {
                component: descriptor.id().to_owned(),
                property: name.to_owned(),
            })
    };
    Ok(Renamer {
        from: read("from")?,
        to: read("to")?,
    })
}

#[test]
fn hooks_are_discovered_from_descriptors() {
    let log = EventLog::default();
    let mut container = widget_container(&log);
    container
        .register_post_processor_type("Renamer", renamer_from)
        .unwrap();
    container
        .register_descriptors([
            widget("db").with_property("uri", "jdbc:mem://y"),
            ComponentDescriptor::new("rename-uri", "Renamer")
                .with_property("from", "uri")
                .with_property("to", "url"),
        ])
        .unwrap();

    container.refresh().unwrap();

    assert_eq!(container.invoked_post_processors(), ["rename-uri"]);
    let db = container.get::<test_utils::Widget>("db").unwrap();
    assert_eq!(db.url.as_deref(), Some("jdbc:mem://y"));
    // Hook descriptors are metadata, never components.
    assert_eq!(log.constructions(), ["db"]);
    assert!(matches!(
        container.get_erased("rename-uri"),
        Err(ContainerError::NoSuchComponent(_))
    ));
}

#[test]
fn hook_descriptor_added_by_a_hook_runs_next_round() {
    let log = EventLog::default();
    let mut container = widget_container(&log);
    container
        .register_post_processor_type("Renamer", renamer_from)
        .unwrap();
    container
        .register_descriptor(widget("db").with_property("address", "jdbc:mem://z"))
        .unwrap();
    container
        .add_post_processors(post_processor_fn("install-renamer", |view| {
            view.register_descriptor(
                ComponentDescriptor::new("rename-address", "Renamer")
                    .with_property("from", "address")
                    .with_property("to", "url"),
            )
        }))
        .unwrap();

    container.refresh().unwrap();

    assert_eq!(
        container.invoked_post_processors(),
        ["install-renamer", "rename-address"]
    );
    let db = container.get::<test_utils::Widget>("db").unwrap();
    assert_eq!(db.url.as_deref(), Some("jdbc:mem://z"));
}

#[test]
fn hook_descriptor_rewritten_earlier_in_the_round_runs_as_rewritten() {
    let log = EventLog::default();
    let mut container = widget_container(&log);
    container
        .register_post_processor_type("Renamer", renamer_from)
        .unwrap();
    container
        .register_descriptors([
            widget("db").with_property("address", "jdbc:mem://w"),
            ComponentDescriptor::new("rename", "Renamer")
                .with_property("from", "unset")
                .with_property("to", "url"),
        ])
        .unwrap();
    container
        .add_post_processors(
            post_processor_fn("fill-renamer", |view| {
                view.require_descriptor_mut("rename")?
                    .set_property("from", "address");
                Ok(())
            })
            .with_priority(0),
        )
        .unwrap();

    container.refresh().unwrap();

    assert_eq!(container.invoked_post_processors(), ["fill-renamer", "rename"]);
    let db = container.get::<test_utils::Widget>("db").unwrap();
    assert_eq!(db.url.as_deref(), Some("jdbc:mem://w"));
}

#[test]
fn hook_descriptor_removed_earlier_in_the_round_never_runs() {
    let log = EventLog::default();
    let mut container = widget_container(&log);
    container
        .register_post_processor_type("Renamer", renamer_from)
        .unwrap();
    container
        .register_descriptors([
            widget("db").with_property("uri", "jdbc:mem://v"),
            ComponentDescriptor::new("rename-uri", "Renamer")
                .with_property("from", "uri")
                .with_property("to", "url"),
        ])
        .unwrap();
    container
        .add_post_processors(
            post_processor_fn("drop-renamer", |view| {
                view.remove_descriptor("rename-uri").map(|_| ())
            })
            .with_priority(0),
        )
        .unwrap();

    container.refresh().unwrap();

    assert_eq!(container.invoked_post_processors(), ["drop-renamer"]);
    let db = container.get::<test_utils::Widget>("db").unwrap();
    assert_eq!(db.url, None);
}

#[test]
fn broken_hook_descriptor_fails_startup_naming_it() {
    let mut container = Container::new();
    container
        .register_post_processor_type("Renamer", renamer_from)
        .unwrap();
    container
        .register_descriptor(
            ComponentDescriptor::new("half-renamer", "Renamer").with_property("from", "a"),
        )
        .unwrap();

    let err = container.refresh().unwrap_err();

    assert!(matches!(
        &err,
        ContainerError::PostProcessorFailed {
            processor,
            source: ConfigError::MissingProperty { .. },
        } if processor == "half-renamer"
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTY-BASED
// ═══════════════════════════════════════════════════════════════════════════════

mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Every hook runs exactly once, in an order consistent with
        /// priorities, and before any component is built.
        #[test]
        fn prop_hooks_run_once_in_priority_order(
            priorities in prop::collection::vec(prop::option::of(-5i32..5), 0..12),
            components in 0usize..5,
        ) {
            let log = EventLog::default();
            let mut container = widget_container(&log);
            for i in 0..components {
                container.register_descriptor(widget(&format!("w{i}"))).unwrap();
            }
            for (i, priority) in priorities.iter().enumerate() {
                container
                    .add_post_processors(Recording::new(&format!("h{i}"), *priority, &log))
                    .unwrap();
            }

            container.refresh().unwrap();

            let hooks = log.hooks();
            prop_assert_eq!(hooks.len(), priorities.len());

            let mut expected: Vec<(usize, Option<i32>)> =
                priorities.iter().copied().enumerate().collect();
            expected.sort_by_key(|(_, p)| (p.is_none(), p.unwrap_or_default()));
            let expected: Vec<String> = expected.iter().map(|(i, _)| format!("h{i}")).collect();
            prop_assert_eq!(&hooks, &expected);

            let events = log.events();
            let first_new = events
                .iter()
                .position(|e| e.starts_with("new:"))
                .unwrap_or(events.len());
            let last_hook = events
                .iter()
                .rposition(|e| e.starts_with("hook:"))
                .map_or(0, |i| i + 1);
            prop_assert!(last_hook <= first_new);
            prop_assert_eq!(log.constructions().len(), components);
        }

        /// A failure at any position means nothing is ever built.
        #[test]
        fn prop_any_failure_prevents_instantiation(
            before in 0usize..5,
            after in 0usize..5,
            components in 1usize..5,
        ) {
            let log = EventLog::default();
            let mut container = widget_container(&log);
            for i in 0..components {
                container.register_descriptor(widget(&format!("w{i}"))).unwrap();
            }
            for i in 0..before {
                container
                    .add_post_processors(Recording::new(&format!("b{i}"), None, &log))
                    .unwrap();
            }
            container
                .add_post_processors(test_utils::Failing { name: "boom".into(), log: log.clone() })
                .unwrap();
            for i in 0..after {
                container
                    .add_post_processors(Recording::new(&format!("a{i}"), None, &log))
                    .unwrap();
            }

            let result = container.refresh();

            let failed_on_boom = matches!(
                &result,
                Err(ContainerError::PostProcessorFailed { processor, .. }) if processor == "boom"
            );
            prop_assert!(failed_on_boom);
            prop_assert_eq!(log.hooks().len(), before + 1);
            prop_assert!(log.constructions().is_empty());
            prop_assert!(container.instantiated().is_empty());
        }
    }
}
