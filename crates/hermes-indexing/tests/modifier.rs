//! Modification engine tests.

use hermes_indexing::perform::{
    feed, feed_content, feed_content_escaped, feed_indexed, feed_key, feed_name, feed_value, pop,
    push, push_key, rem_flag, set_flag, set_flag_if_before, set_flag_if_not_before, skip,
};
use hermes_indexing::{
    collect, iterate_modified, Action, Alter, Block, Content, Escapes, Index, IndexingError,
    IndexingResult, Modifier, ModifierByIndex, NoAlter, Provided,
};
use proptest::prelude::*;
use std::io::Cursor;
use std::sync::Arc;

fn body(text: &str) -> Content {
    Content::new(Cursor::new(text.as_bytes().to_vec()))
}

fn run(content: Content, alter: impl Alter + 'static) -> IndexingResult<String> {
    let output = collect(ModifierByIndex::new(content, Arc::new(alter)))?;
    Ok(String::from_utf8(output).unwrap())
}

/// Registers the same names on every index.
struct Names(Vec<&'static str>);

impl Alter for Names {
    fn alter(&self, modifier: &mut dyn Modifier) -> IndexingResult<()> {
        modifier.register(&self.0, None);
        Ok(())
    }
}

/// Registers a name with a provided value built per index.
struct Providing<F>(&'static str, F);

impl<F> Alter for Providing<F>
where
    F: Fn() -> Provided + Send + Sync,
{
    fn alter(&self, modifier: &mut dyn Modifier) -> IndexingResult<()> {
        modifier.register(&[self.0], Some((self.1)()));
        Ok(())
    }
}

fn replace_block() -> Arc<Block> {
    Arc::new(
        Block::new(
            "B",
            vec![Action::new(
                "replace",
                vec![skip("start"), feed_key("name"), skip("end")],
            )],
        )
        .with_keys(["name"]),
    )
}

#[test]
fn test_skip_and_feed_key() {
    let index = Index::new(replace_block())
        .offset("start", 2)
        .offset("end", 4)
        .text("name", "X");
    let content = body("a:__:b").with_indexes(vec![index]);

    assert_eq!(run(content, Names(vec!["replace"])).unwrap(), "a:X:b");
}

#[test]
fn test_unregistered_blocks_pass_through() {
    let index = Index::new(replace_block())
        .offset("start", 2)
        .offset("end", 4)
        .text("name", "X");
    let content = body("a:__:b").with_indexes(vec![index]);

    assert_eq!(run(content, NoAlter).unwrap(), "a:__:b");
}

#[test]
fn test_several_indexes_with_small_packages() {
    let block = replace_block();
    let indexes = vec![
        Index::new(Arc::clone(&block))
            .offset("start", 1)
            .offset("end", 3)
            .text("name", "one"),
        Index::new(block)
            .offset("start", 6)
            .offset("end", 9)
            .text("name", "two"),
    ];
    let content = body("[..]-[...]!")
        .with_indexes(indexes)
        .with_maximum(2);

    assert_eq!(run(content, Names(vec!["replace"])).unwrap(), "[one]-[two]!");
}

#[test]
fn test_default_actions_are_registered_last() {
    let block = Arc::new(Block::new(
        "B",
        vec![
            Action::new("mark", vec![feed_value("<")]),
            Action::new("close", vec![feed_value(">")]),
        ],
    ));
    let content = body("ab").with_indexes(vec![Index::new(block).offset("start", 1)]);
    let modifier = iterate_modified(Arc::new(NoAlter), content, &["close"]);

    assert_eq!(collect(modifier).unwrap(), b"a>b");
}

#[test]
fn test_final_action_stops_registration() {
    let block = Arc::new(Block::new(
        "B",
        vec![
            Action::new("first", vec![feed_value("1")]),
            Action::new("second", vec![feed_value("2")]),
            Action::new("open", vec![feed_value("o")]).non_final(),
        ],
    ));
    let index = || Index::new(Arc::clone(&block)).offset("start", 0);

    let content = body("").with_indexes(vec![index()]);
    assert_eq!(run(content, Names(vec!["first", "second"])).unwrap(), "1");

    let content = body("").with_indexes(vec![index()]);
    assert_eq!(run(content, Names(vec!["open", "second"])).unwrap(), "o2");
}

#[test]
fn test_before_triggers_run_once_and_first() {
    let block = Arc::new(Block::new(
        "B",
        vec![
            Action::new("prefix", vec![feed_value("(")]).non_final(),
            Action::new("left", vec![feed_value("L")]).before(["prefix"]).non_final(),
            Action::new("right", vec![feed_value("R")]).before(["prefix"]),
        ],
    ));
    let content = body("").with_indexes(vec![Index::new(block).offset("start", 0)]);

    assert_eq!(run(content, Names(vec!["left", "right"])).unwrap(), "(LR");
}

#[test]
fn test_rewind_streams_recorded_bytes_again() {
    let block = Arc::new(Block::new(
        "B",
        vec![
            Action::new("peek", vec![push("head", "end"), feed_name("head"), pop("head")])
                .non_final()
                .rewinding(),
            Action::new("wrap", vec![feed_value("["), feed("end"), feed_value("]")]),
        ],
    ));
    let index = Index::new(block).offset("start", 0).offset("end", 3);
    let content = body("abcdef").with_indexes(vec![index]);

    assert_eq!(run(content, Names(vec!["peek", "wrap"])).unwrap(), "abc[abc]def");
}

#[test]
fn test_flags_gate_performs() {
    let block = Arc::new(Block::new(
        "B",
        vec![Action::new(
            "gate",
            vec![
                feed_value("a").when(["on"]),
                set_flag(["on"]),
                feed_value("b").when(["on"]),
                rem_flag(["on"]),
                feed_value("c").when(["on"]),
            ],
        )],
    ));
    let content = body("").with_indexes(vec![Index::new(block).offset("start", 0)]);

    assert_eq!(run(content, Names(vec!["gate"])).unwrap(), "b");
}

#[test]
fn test_set_flag_if_before_boundaries() {
    let block = Arc::new(Block::new(
        "B",
        vec![Action::new(
            "check",
            vec![
                set_flag_if_before("at", ["before"]),
                set_flag_if_not_before("at", ["reached"]),
                feed_value("B").when(["before"]),
                feed_value("R").when(["reached"]),
            ],
        )],
    ));
    let check = |at: u64| {
        // The block starts at 0, so the stream stands at offset 0 when checking.
        let index = Index::new(Arc::clone(&block)).offset("start", 0).offset("at", at);
        let content = body("xy").with_indexes(vec![index]);
        run(content, Names(vec!["check"])).unwrap()
    };

    assert_eq!(check(1), "Bxy");
    assert_eq!(check(0), "Rxy");
}

#[test]
fn test_push_key_and_feed_name() {
    let block = Arc::new(Block::new(
        "B",
        vec![Action::new(
            "echo",
            vec![
                push_key("stack", "name"),
                feed_name("stack"),
                pop("stack"),
                feed_name("stack"),
            ],
        )],
    ));
    let index = Index::new(block).offset("start", 1).text("name", "N");
    let content = body("ab").with_indexes(vec![index]);

    assert_eq!(run(content, Names(vec!["echo"])).unwrap(), "aNb");
}

#[test]
fn test_feed_content_text_is_escaped() {
    let escapes = Arc::new(Escapes::new([("<", "&lt;"), ("&", "&amp;")]).unwrap());
    let block = Arc::new(Block::new(
        "B",
        vec![Action::new(
            "insert",
            vec![skip("end"), feed_content_escaped(escapes)],
        )],
    ));
    let index = Index::new(block).offset("start", 1).offset("end", 2);
    let content = body("a_b").with_indexes(vec![index]);
    let alter = Providing("insert", || Provided::text("<&>"));

    assert_eq!(run(content, alter).unwrap(), "a&lt;&amp;>b");
}

#[test]
fn test_feed_content_stream_is_escaped_across_packages() {
    let escapes = Arc::new(Escapes::new([("<<", "&laquo;"), ("<", "&lt;")]).unwrap());
    let block = Arc::new(Block::new(
        "B",
        vec![Action::new(
            "insert",
            vec![skip("end"), feed_content_escaped(escapes)],
        )],
    ));
    let index = Index::new(block).offset("start", 1).offset("end", 2);
    let content = body("[_]").with_indexes(vec![index]).with_maximum(2);
    let alter = Providing("insert", || Provided::content(body("a\u{e9}<<b")));

    let packages: Vec<_> = ModifierByIndex::new(content, Arc::new(alter))
        .collect::<IndexingResult<_>>()
        .unwrap();
    assert!(packages.iter().all(|package| package.len() <= 2));
    let output: Vec<u8> = packages.concat();
    assert_eq!(String::from_utf8(output).unwrap(), "[a\u{e9}&laquo;b]");
}

#[test]
fn test_feed_content_streams_and_closes() {
    let block = Arc::new(Block::new("B", vec![Action::new("insert", vec![feed_content()])]));
    let index = Index::new(block).offset("start", 1);
    let content = body("[]").with_indexes(vec![index]).with_maximum(3);
    let alter = Providing("insert", || Provided::content(body("streamed content")));

    assert_eq!(run(content, alter).unwrap(), "[streamed content]");
}

#[test]
fn test_action_without_value_is_not_registered() {
    let block = Arc::new(Block::new("B", vec![Action::new("insert", vec![feed_content()])]));
    let content = body("ab").with_indexes(vec![Index::new(block).offset("start", 1)]);

    assert_eq!(run(content, Names(vec!["insert"])).unwrap(), "ab");
}

#[test]
fn test_feed_indexed_recurses() {
    let inner = Arc::new(
        Block::new(
            "Inner",
            vec![Action::new("name", vec![skip("end"), feed_key("name")])],
        )
        .with_keys(["name"]),
    );
    let outer = Arc::new(Block::new(
        "Outer",
        vec![Action::new("include", vec![skip("end"), feed_indexed(["name"])])],
    ));

    let nested = body("<?>")
        .with_indexes(vec![Index::new(inner).offset("start", 1).offset("end", 2).text("name", "in")]);
    let provided = Provided::content(nested);
    let content = body("{#}")
        .with_indexes(vec![Index::new(outer).offset("start", 1).offset("end", 2)]);
    let alter = Providing("include", move || provided.clone());

    assert_eq!(run(content, alter).unwrap(), "{<in>}");
}

#[test]
fn test_fetch_runs_non_final_action() {
    struct Fetching;

    impl Alter for Fetching {
        fn alter(&self, modifier: &mut dyn Modifier) -> IndexingResult<()> {
            let title = modifier.fetch("title")?.unwrap_or_default();
            assert!(modifier.fetch("missing")?.is_none());
            modifier.register(&["upper"], Some(Provided::text(title.to_uppercase())));
            Ok(())
        }
    }

    let block = Arc::new(Block::new(
        "B",
        vec![
            Action::new("title", vec![feed("end")]).non_final().rewinding(),
            Action::new("upper", vec![skip("end"), feed_content()]),
        ],
    ));
    let index = Index::new(block).offset("start", 1).offset("end", 4);
    let content = body("<abc>").with_indexes(vec![index]);

    assert_eq!(run(content, Fetching).unwrap(), "<ABC>");
}

#[test]
fn test_missing_bytes_fail_the_iteration() {
    let block = Arc::new(Block::new("B", vec![Action::new("skip", vec![skip("end")])]));
    let index = Index::new(block).offset("start", 0).offset("end", 10);
    let mut modifier = ModifierByIndex::new(body("abc").with_indexes(vec![index]), Arc::new(Names(vec!["skip"])));

    let error = modifier.next().unwrap().unwrap_err();
    assert!(matches!(error, IndexingError::MissingBytes { missing: 7 }));
    assert!(modifier.next().is_none());
}

#[test]
fn test_unknown_index_value() {
    let block = Arc::new(Block::new("B", vec![Action::new("skip", vec![skip("nowhere")])]));
    let content = body("abc").with_indexes(vec![Index::new(block).offset("start", 0)]);

    let error = run(content, Names(vec!["skip"])).unwrap_err();
    assert_eq!(error.to_string(), "Index for block 'B' has no value 'nowhere'");
}

proptest! {
    #[test]
    fn prop_no_actions_is_verbatim(
        bytes in proptest::collection::vec(any::<u8>(), 0..2048),
        maximum in 1usize..64,
        offsets in proptest::collection::vec(any::<u16>(), 0..8),
    ) {
        let block = replace_block();
        let mut offsets: Vec<u64> = offsets.into_iter().map(u64::from).collect();
        offsets.sort_unstable();
        let indexes = offsets
            .into_iter()
            .map(|offset| Index::new(Arc::clone(&block)).offset("start", offset))
            .collect();
        let content = Content::new(Cursor::new(bytes.clone()))
            .with_indexes(indexes)
            .with_maximum(maximum);

        let output = collect(ModifierByIndex::new(content, Arc::new(NoAlter))).unwrap();
        prop_assert_eq!(output, bytes);
    }

    #[test]
    fn prop_escaping_twice_is_escaping_once(text in "[a-z<>& ]{0,64}") {
        let escapes = Escapes::new([("<", "[lt]"), (">", "[gt]"), ("&", "[amp]")]).unwrap();
        let once = escapes.apply(&text);
        prop_assert_eq!(escapes.apply(&once), once);
    }
}
