//! Branch, renaming and joining tests.

use hermes_core::{AssemblyError, ContextSpec};
use hermes_pipeline::{
    Arg, Assembly, BoxFuture, Brancher, BranchingHandler, Chain, Combine, Contexts, Contextual,
    ExecutionResult, Handler, Joiner, Processing, Renamer, Routing, RoutingHandler, Using,
};
use std::sync::Arc;

type Action = Arc<dyn Fn(&mut Chain) -> ExecutionResult<()> + Send + Sync>;

struct Step {
    name: &'static str,
    contexts: Contexts,
    action: Action,
}

fn step<F>(name: &'static str, contexts: Contexts, action: F) -> Contextual<Step>
where
    F: Fn(&mut Chain) -> ExecutionResult<()> + Send + Sync + 'static,
{
    Contextual::new(Step {
        name,
        contexts,
        action: Arc::new(action),
    })
}

impl Handler for Step {
    fn name(&self) -> &str {
        self.name
    }

    fn contexts(&self) -> Contexts {
        self.contexts.clone()
    }

    fn process<'a>(&'a self, chain: &'a mut Chain) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move { (self.action)(chain) })
    }
}

fn request_sources() -> Contexts {
    Contexts::new().with("request", ContextSpec::new("Request").defines::<String>("uri"))
}

fn echo() -> Contextual<Step> {
    step(
        "echo",
        Contexts::new()
            .with("request", ContextSpec::new("Request").requires::<String>("uri"))
            .with("response", ContextSpec::new("Response").defines::<String>("text")),
        |chain| {
            let uri: String = chain.object("request")?.get("uri").unwrap_or_default();
            chain.object("response")?.set("text", format!("echo {uri}"))?;
            Ok(())
        },
    )
}

#[tokio::test]
async fn test_merged_routing_shares_contexts() {
    let router = Brancher::new(RoutingHandler::new("router")).branch(Routing::new(Assembly::new("echo").with(echo())));
    let processing = Assembly::new("main").with(router).create(&request_sources()).unwrap();

    assert!(processing.context("response").unwrap().declares("text"));
    assert_eq!(processing.call_names(), vec!["router"]);

    let request = processing.context("request").unwrap().create();
    request.set("uri", "/articles".to_string()).unwrap();
    let arg = processing
        .execute_with_all(Arg::new().with_object("request", request))
        .await
        .unwrap();
    assert_eq!(
        arg.object("response").unwrap().get::<String>("text").as_deref(),
        Some("echo /articles")
    );
}

#[test]
fn test_routing_requires_source_attributes() {
    let router = Brancher::new(RoutingHandler::new("router")).branch(Routing::new(Assembly::new("echo").with(echo())));
    let error = Assembly::new("main").with(router).create(&Contexts::new()).unwrap_err();

    match error.root() {
        AssemblyError::Unavailable { scope, name, attributes } => {
            assert_eq!(*scope, "Routing");
            assert_eq!(name, "echo");
            assert!(attributes[0].starts_with("request.uri"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(error.locations().contains(&"branch 'echo'"));
}

#[test]
fn test_unmerged_routing_generates_contexts() {
    let router =
        Brancher::new(RoutingHandler::new("router")).branch(Routing::unmerged(Assembly::new("echo").with(echo())));
    let processing = Assembly::new("main").with(router).create(&request_sources()).unwrap();

    assert!(processing.context("response").is_none());
    assert!(processing.context("request").is_some());
}

struct Collect;

impl BranchingHandler for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    fn contexts(&self) -> Contexts {
        Contexts::new().with("request", ContextSpec::new("Request").requires::<String>("uri"))
    }

    fn process<'a>(
        &'a self,
        chain: &'a mut Chain,
        processings: &'a [Arc<Processing>],
    ) -> BoxFuture<'a, ExecutionResult<()>> {
        Box::pin(async move {
            let request = chain.object("request")?;
            let uri: String = request.get("uri").unwrap_or_default();
            let processing = &processings[0];
            let solicitation = processing.context("solicitation").map(|class| class.create());
            if let Some(solicitation) = solicitation {
                solicitation.set("uri", uri)?;
                let arg = processing
                    .execute_with_all(Arg::new().with_object("solicitation", solicitation))
                    .await?;
                let text: Option<String> = arg.object("answer").and_then(|answer| answer.get("text"));
                if let Some(text) = text {
                    request.set("uri", text)?;
                }
            }
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_using_runs_on_its_own_contexts() {
    let inner = Assembly::new("inner").with(step(
        "answer",
        Contexts::new()
            .with("solicitation", ContextSpec::new("Solicitation").requires::<String>("uri"))
            .with("answer", ContextSpec::new("Answer").defines::<String>("text")),
        |chain| {
            let uri: String = chain.object("solicitation")?.get("uri").unwrap_or_default();
            chain.object("answer")?.set("text", uri.to_uppercase())?;
            Ok(())
        },
    ));
    let collect = Brancher::new(Collect).branch(
        Using::new(inner).context("solicitation", ContextSpec::new("Solicitation").defines::<String>("uri")),
    );
    let processing = Assembly::new("main").with(collect).create(&request_sources()).unwrap();

    assert!(processing.context("solicitation").is_none());
    let request = processing.context("request").unwrap().create();
    request.set("uri", "/abc".to_string()).unwrap();
    let arg = processing
        .execute_with_all(Arg::new().with_object("request", request))
        .await
        .unwrap();
    assert_eq!(arg.object("request").unwrap().get::<String>("uri").as_deref(), Some("/ABC"));
}

#[test]
fn test_using_reports_unavailable() {
    let inner = Assembly::new("inner").with(step(
        "answer",
        Contexts::new().with("solicitation", ContextSpec::new("Solicitation").requires::<String>("uri")),
        |_| Ok(()),
    ));
    let collect = Brancher::new(Collect).branch(Using::new(inner));
    let error = Assembly::new("main").with(collect).create(&request_sources()).unwrap_err();

    assert!(matches!(error.root(), AssemblyError::Unavailable { scope: "Using", .. }));
}

#[tokio::test]
async fn test_renamer_maps_contexts() {
    let flagger = step(
        "flagger",
        Contexts::new().with(
            "solicitation",
            ContextSpec::new("Solicitation").requires::<String>("uri").defines::<bool>("flag"),
        ),
        |chain| {
            let solicitation = chain.object("solicitation")?;
            let uri: String = solicitation.get("uri").unwrap_or_default();
            solicitation.set("flag", uri.starts_with("/secure"))?;
            Ok(())
        },
    );
    let processing = Assembly::new("main")
        .with(Renamer::new(flagger, &[("solicitation", "request")]))
        .create(&request_sources())
        .unwrap();

    assert!(processing.context("request").unwrap().declares("flag"));
    assert!(processing.context("solicitation").is_none());

    let request = processing.context("request").unwrap().create();
    request.set("uri", "/secure/area".to_string()).unwrap();
    let arg = processing
        .execute_with_all(Arg::new().with_object("request", request))
        .await
        .unwrap();
    assert!(!arg.contains("solicitation"));
    assert_eq!(arg.object("request").unwrap().get::<bool>("flag"), Some(true));
}

#[test]
fn test_combine_renames_branch_contexts() {
    let inner = Assembly::new("inner").with(step(
        "marker",
        Contexts::new().with(
            "solicitation",
            ContextSpec::new("Solicitation").requires::<String>("uri").defines::<i64>("length"),
        ),
        |chain| {
            let solicitation = chain.object("solicitation")?;
            let uri: String = solicitation.get("uri").unwrap_or_default();
            solicitation.set("length", i64::try_from(uri.len()).unwrap_or(i64::MAX))?;
            Ok(())
        },
    ));
    let router = Brancher::new(RoutingHandler::new("router"))
        .branch(Combine::new(Routing::new(inner), &[("solicitation", "request")]));
    let processing = Assembly::new("main").with(router).create(&request_sources()).unwrap();

    assert!(processing.context("request").unwrap().declares("length"));
}

#[tokio::test]
async fn test_joiner_first_declaration_wins() {
    let first = step(
        "first",
        Contexts::new().with("primary", ContextSpec::new("Primary").defines::<i64>("count")),
        |chain| {
            chain.object("primary")?.set("count", 1_i64)?;
            Ok(())
        },
    );
    let second = step(
        "second",
        Contexts::new().with(
            "secondary",
            ContextSpec::new("Secondary").defines::<i64>("count").defines::<String>("label"),
        ),
        |chain| {
            let secondary = chain.object("secondary")?;
            secondary.set("count", 2_i64)?;
            secondary.set("label", "second".to_string())?;
            Ok(())
        },
    );
    let reader = step(
        "reader",
        Contexts::new().with(
            "joined",
            ContextSpec::new("Joined").requires::<i64>("count").requires::<String>("label"),
        ),
        |_| Ok(()),
    );
    let processing = Assembly::new("main")
        .with(first)
        .with(second)
        .with(Joiner::new("join", "joined", &["primary", "secondary"]))
        .with(reader)
        .create(&Contexts::new())
        .unwrap();

    let arg = processing.execute_with_all(Arg::new()).await.unwrap();
    let joined = arg.object("joined").unwrap();
    assert_eq!(joined.get::<i64>("count"), Some(1));
    assert_eq!(joined.get::<String>("label").as_deref(), Some("second"));
}
