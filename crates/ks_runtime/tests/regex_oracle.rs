//! Generated patterns checked against the `regex` crate on a dialect
//! subset both engines read the same way.

use ks_runtime::CompiledPattern;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn atom() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("a".to_string()),
        Just("b".to_string()),
        Just("c".to_string()),
        Just(".".to_string()),
        Just("[ab]".to_string()),
        Just("[^a]".to_string()),
        Just("[a-c]".to_string()),
    ]
}

fn quantifier() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(""),
        Just(""),
        Just("*"),
        Just("+"),
        Just("?"),
        Just("*?"),
        Just("+?"),
        Just("??"),
        Just("{2}"),
        Just("{1,2}"),
        Just("{0,2}?"),
    ]
}

fn piece() -> impl Strategy<Value = String> {
    (atom(), quantifier()).prop_map(|(a, q)| a + q)
}

fn branch() -> impl Strategy<Value = String> {
    prop::collection::vec(piece(), 1..4).prop_map(|ps| ps.concat())
}

fn pattern() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(branch(), 1..3),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(branches, group, start, end)| {
            let mut body = branches.join("|");
            if group || (branches.len() > 1 && (start || end)) {
                body = format!("({body})");
            }
            format!(
                "{}{body}{}",
                if start { "^" } else { "" },
                if end { "$" } else { "" }
            )
        })
}

fn text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof![Just('a'), Just('b'), Just('c')], 0..12)
        .prop_map(|cs| cs.into_iter().collect())
}

fn oracle(pattern: &str) -> regex::bytes::Regex {
    regex::bytes::Regex::new(&format!("(?-u){pattern}")).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, max_shrink_iters: 200, .. ProptestConfig::default() })]

    #[test]
    fn find_all_agrees_with_regex_crate(p in pattern(), t in text()) {
        let ours = CompiledPattern::new(p.as_bytes()).unwrap();
        let theirs = oracle(&p);
        let got: Vec<(usize, usize)> = ours
            .find_all(t.as_bytes())
            .iter()
            .map(|m| (m.start, m.end))
            .collect();
        let want: Vec<(usize, usize)> = theirs
            .find_iter(t.as_bytes())
            .map(|m| (m.start(), m.end()))
            .collect();
        prop_assert_eq!(got, want, "pattern {:?} on {:?}", p, t);
    }

    #[test]
    fn is_match_and_first_match_agree(p in pattern(), t in text()) {
        let ours = CompiledPattern::new(p.as_bytes()).unwrap();
        let theirs = oracle(&p);
        prop_assert_eq!(ours.is_match(t.as_bytes()), theirs.is_match(t.as_bytes()));
        let got = ours.find(t.as_bytes(), 0).map(|m| (m.start, m.end));
        let want = theirs.find(t.as_bytes()).map(|m| (m.start(), m.end()));
        prop_assert_eq!(got, want);
    }

    #[test]
    fn captures_agree_on_grouped_branches(a in branch(), b in branch(), t in text()) {
        let p = format!("({a})({b})");
        let ours = CompiledPattern::new(p.as_bytes()).unwrap();
        let theirs = oracle(&p);
        let got = ours.captures(t.as_bytes(), 0).map(|c| {
            c.iter().map(|g| g.map(|m| (m.start, m.end))).collect::<Vec<_>>()
        });
        let want = theirs.captures(t.as_bytes()).map(|c| {
            c.iter().map(|g| g.map(|m| (m.start(), m.end()))).collect::<Vec<_>>()
        });
        prop_assert_eq!(got, want);
    }

    #[test]
    fn split_agrees_with_regex_crate(t in text()) {
        let ours = CompiledPattern::new(b"b+").unwrap();
        let theirs = oracle("b+");
        let got = ours.split(t.as_bytes());
        let want: Vec<&[u8]> = theirs.split(t.as_bytes()).collect();
        prop_assert_eq!(got, want);
    }
}
