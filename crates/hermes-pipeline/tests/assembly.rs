//! Assembly compilation tests.

use hermes_core::{
    types, AssemblyError, AttrError, Attribute, ContextSpec, ProcessorError, ResolverError, TypeSet,
};
use hermes_pipeline::{
    Assembly, BoxFuture, Chain, Composite, Contexts, Contextual, ExecutionResult, Handler,
    Processor,
};
use proptest::prelude::*;
use std::sync::Arc;

struct Declares {
    name: &'static str,
    contexts: Contexts,
}

impl Declares {
    fn new(name: &'static str, contexts: Contexts) -> Contextual<Self> {
        Contextual::new(Self { name, contexts })
    }
}

impl Handler for Declares {
    fn name(&self) -> &str {
        self.name
    }

    fn contexts(&self) -> Contexts {
        self.contexts.clone()
    }

    fn process<'a>(&'a self, _chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

fn ctx(spec: ContextSpec) -> Contexts {
    Contexts::new().with("ctx", spec)
}

fn defines_a() -> Contextual<Declares> {
    Declares::new("definer", ctx(ContextSpec::new("Ctx").defines::<i64>("a")))
}

fn requires_a() -> Contextual<Declares> {
    Declares::new(
        "requirer",
        ctx(ContextSpec::new("Ctx").with("a", Attribute::requires(types![i64, f64]))),
    )
}

#[test]
fn test_required_not_produced_fails() {
    let assembly = Assembly::new("main").with(Declares::new(
        "reader",
        ctx(ContextSpec::new("Ctx").requires::<i64>("a")),
    ));

    let error = assembly.create(&Contexts::new()).unwrap_err();
    match error.root() {
        AssemblyError::Unavailable { scope, attributes, .. } => {
            assert_eq!(*scope, "Assembly");
            assert!(attributes.iter().any(|line| line.starts_with("ctx.a")));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(error.to_string().contains("ctx.a"));
}

#[test]
fn test_defined_then_required_composes() {
    let assembly = Assembly::new("main").with(defines_a()).with(requires_a());

    let processing = assembly.create(&Contexts::new()).unwrap();
    let class = processing.context("ctx").unwrap();
    assert_eq!(class.descriptor("a").unwrap().types(), &TypeSet::of::<i64>());
    assert_eq!(processing.call_names(), vec!["definer", "requirer"]);
}

#[test]
fn test_required_before_defined_is_an_ordering_violation() {
    let assembly = Assembly::new("main").with(requires_a()).with(defines_a());

    let error = assembly.create(&Contexts::new()).unwrap_err();
    assert!(matches!(
        error.root(),
        AssemblyError::Resolver(ResolverError::Attribute {
            source: AttrError::ImproperOrder { .. },
            ..
        })
    ));
    assert_eq!(error.locations(), vec!["processor 'definer'", "assembly 'main'"]);
}

#[test]
fn test_sources_satisfy_requirements() {
    let assembly = Assembly::new("main").with(requires_a());
    let sources = ctx(ContextSpec::new("Ctx").defines::<i64>("a"));

    let processing = assembly.create(&sources).unwrap();
    assert!(processing.context("ctx").unwrap().declares("a"));
}

#[test]
fn test_incompatible_types_fail() {
    let assembly = Assembly::new("main")
        .with(defines_a())
        .with(Declares::new("texts", ctx(ContextSpec::new("Ctx").requires::<String>("a"))));

    let error = assembly.create(&Contexts::new()).unwrap_err();
    assert!(matches!(
        error.root(),
        AssemblyError::Resolver(ResolverError::Attribute {
            source: AttrError::IncompatibleTypes { .. },
            ..
        })
    ));
}

#[test]
fn test_assembly_is_deterministic() {
    let assembly = Assembly::new("main")
        .with(defines_a())
        .with(Declares::new(
            "other",
            Contexts::new()
                .with("ctx", ContextSpec::new("Ctx").optional::<i64>("a").defines::<String>("b"))
                .with("extra", ContextSpec::new("Extra").defines::<bool>("flag")),
        ))
        .with(requires_a());

    let first = assembly.create(&Contexts::new()).unwrap();
    let second = assembly.create(&Contexts::new()).unwrap();
    assert_eq!(first.call_names(), second.call_names());
    let shape = |processing: &hermes_pipeline::Processing| {
        processing
            .contexts()
            .iter()
            .map(|(name, class)| {
                let descriptors: Vec<(String, String)> = class
                    .descriptors()
                    .map(|d| (d.name().to_string(), d.types().to_string()))
                    .collect();
                (name.clone(), descriptors)
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));
}

#[test]
fn test_optional_only_attribute_is_available() {
    let assembly = Assembly::new("main").with(Declares::new(
        "peeker",
        ctx(ContextSpec::new("Ctx").optional::<i64>("a")),
    ));

    let processing = assembly.create(&Contexts::new()).unwrap();
    let class = processing.context("ctx").unwrap();
    assert!(class.declares("a"));
}

#[test]
fn test_processor_without_contexts_fails() {
    let assembly = Assembly::new("main").with(Declares::new("empty", Contexts::new()));

    let error = assembly.create(&Contexts::new()).unwrap_err();
    assert!(matches!(
        error.root(),
        AssemblyError::Processor(ProcessorError::NoContexts { .. })
    ));
}

#[test]
fn test_pushed_context_must_be_new() {
    let processor = defines_a().push("ctx", ContextSpec::new("Ctx").optional::<i64>("b"));
    let assembly = Assembly::new("main").with(processor);

    let error = assembly.create(&Contexts::new()).unwrap_err();
    assert!(matches!(
        error.root(),
        AssemblyError::Processor(ProcessorError::DuplicateContext { .. })
    ));
}

#[test]
fn test_composite_registers_in_order() {
    let assembly = Assembly::new("main").with(Composite::new("both").with(defines_a()).with(requires_a()));

    let processing = assembly.create(&Contexts::new()).unwrap();
    assert_eq!(processing.call_names(), vec!["definer", "requirer"]);
}

#[test]
fn test_editing_operations() {
    let mut assembly = Assembly::new("main").with(defines_a()).with(requires_a());

    let extra: Arc<dyn Processor> = Arc::new(Declares::new(
        "extra",
        Contexts::new().with("other", ContextSpec::new("Other").defines::<bool>("flag")),
    ));
    assembly.add_before(Arc::clone(&extra), "requirer").unwrap();
    assert_eq!(names(&assembly), vec!["definer", "extra", "requirer"]);

    assembly.move_after("extra", "requirer").unwrap();
    assert_eq!(names(&assembly), vec!["definer", "requirer", "extra"]);

    assembly.move_before("extra", "definer").unwrap();
    assert_eq!(names(&assembly), vec!["extra", "definer", "requirer"]);

    let replaced = assembly.replace("extra", Arc::new(defines_a())).unwrap();
    assert_eq!(replaced.name(), "extra");
    assert_eq!(names(&assembly), vec!["definer", "definer", "requirer"]);

    let error = assembly.remove("missing").err().expect("removing unknown processor should fail");
    assert!(matches!(error, AssemblyError::UnknownProcessor { .. }));
}

fn names(assembly: &Assembly) -> Vec<&str> {
    assembly.processors().iter().map(|p| p.name()).collect()
}

fn unnamed(name: &'static str) -> Arc<dyn Processor> {
    Arc::new(Declares::new(name, Contexts::new()))
}

#[test]
fn test_move_with_unknown_anchor_keeps_the_processor() {
    let mut assembly = Assembly::new("main").with(defines_a()).with(requires_a());

    let error = assembly.move_before("definer", "missing").unwrap_err();
    assert!(matches!(error, AssemblyError::UnknownProcessor { .. }));
    assert_eq!(names(&assembly), vec!["definer", "requirer"]);

    assembly.move_after("requirer", "requirer").unwrap();
    assert_eq!(names(&assembly), vec!["definer", "requirer"]);
}

const NAMES: [&str; 5] = ["a", "b", "c", "d", "e"];

proptest! {
    #[test]
    fn prop_moves_keep_every_processor(moves in prop::collection::vec((0..5usize, 0..5usize, any::<bool>()), 0..20)) {
        let mut assembly = Assembly::new("main");
        for name in NAMES {
            assembly.add(unnamed(name));
        }

        for (moved, anchor, before) in moves {
            let (moved, anchor) = (NAMES[moved], NAMES[anchor]);
            if before {
                assembly.move_before(moved, anchor).unwrap();
            } else {
                assembly.move_after(moved, anchor).unwrap();
            }
            let order = names(&assembly);
            let at = |name: &str| order.iter().position(|n| *n == name).unwrap();
            if moved != anchor {
                if before {
                    prop_assert_eq!(at(moved) + 1, at(anchor));
                } else {
                    prop_assert_eq!(at(anchor) + 1, at(moved));
                }
            }
        }

        let mut order = names(&assembly);
        order.sort_unstable();
        prop_assert_eq!(order, NAMES.to_vec());
    }
}
