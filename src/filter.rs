use std::{collections::HashSet, sync::OnceLock};

/// Fixed denylist of disallowed terms, loaded once per process and never
/// mutated.
///
/// Matching is a whole-token membership test: the query is split on single
/// spaces and the resulting tokens are intersected with this set. Entries
/// containing internal spaces can therefore never match; that limitation is
/// documented behavior, kept as-is.
const CENSORED_WORDS: &[&str] = &[
    "clunge",
    "seductress",
    "slaughter",
    "hooters",
    "crucified",
    "cannibalism",
    "fuck",
    "honkers",
    "oppai",
    "wincest",
    "arrested",
    "jerk off",
    "fascist",
    "sensual",
    "knob",
    "teratoma",
    " mao zedong",
    "cannibal",
    "crotch",
    "bodily fluids",
    "hentai",
    "labia",
    "coochie",
    "phallus",
    "kill",
    "suicide",
    "skimpy",
    "bondage",
    "gruesome",
    "smut",
    "arse",
    "poop",
    "vivisection",
    "killing",
    "shaft",
    "playboy",
    "tryphophobia",
    "big black",
    "nude",
    "horny",
    "jail",
    "honkey",
    "xi jinping",
    "minge",
    "brothel",
    "heroin",
    "breasts",
    "bruises",
    "sexy female",
    "thick",
    "marijuana",
    "legs spread",
    "khorne",
    "handcuffs",
    "girth",
    "badonkers",
    "seducing",
    "orgy",
    "cutting",
    "nipple",
    "sensored",
    "pleasure",
    "taboo",
    "fentanyl",
    "guts",
    "dick",
    "ballgag",
    "bulging",
    "pleasures",
    "thot",
    "hitler",
    "big ass",
    "engorged",
    "erotic seductive",
    "sadist",
    "nasty",
    "flesh",
    "infested",
    "hardcore",
    "bosom",
    "hemoglobin",
    "making love",
    "voluptuous",
    "bimbo",
    "coon",
    "visceral",
    "veiny",
    "shag",
    "dominatrix",
    "ass",
    "incest",
    "bunghole",
    "mammaries",
    "ovaries",
    "surgery",
    "naughty",
    "crucifixion",
    "sultry",
    "prophet mohammed",
    "nazi",
    "busty",
    "sperm",
    "decapitate",
    "crack",
    "female body parts",
    "bloodbath",
    "censored",
    "bloody",
    "ahegao",
    "cocaine",
    "indecent",
    "cronenberg",
    "penis",
    "mommy milker",
    "shibari",
    "meth",
    "bloodshot",
    "seductive",
    "human centipede",
    "weed",
    "cussing",
    "vagina",
    "organs",
    "corpse",
    "sexy",
    "slave",
    "gory",
    "slavegirl",
    "somit",
    "torture",
    "bdsm",
    "twerk",
    "errect",
    "succubus",
    "stripped",
    "naked",
    "massacre",
    "kinbaku",
    "pinup",
    "massive chests",
    "booty",
    "shit",
    "infected",
    "flashy",
    "drugs",
    "staline",
    "porn",
];

fn denylist() -> &'static HashSet<&'static str> {
    static DENYLIST: OnceLock<HashSet<&'static str>> = OnceLock::new();
    DENYLIST.get_or_init(|| CENSORED_WORDS.iter().copied().collect())
}

/// Whether a query contains a denylisted token.
///
/// Case-sensitive, whitespace-sensitive: the query is split on single spaces
/// and each token is looked up verbatim.
pub fn is_blocked(query: &str) -> bool {
    let denylist = denylist();
    query.split(' ').any(|token| denylist.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_denylisted_token() {
        assert!(is_blocked("how to kill a process"));
    }

    #[test]
    fn passes_clean_query() {
        assert!(!is_blocked("how to stop a process"));
        assert!(!is_blocked(""));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!is_blocked("KILL the lights"));
    }

    #[test]
    fn substrings_do_not_match() {
        // "killing" is itself listed, but "killings" is not a token match.
        assert!(!is_blocked("overkill"));
        assert!(!is_blocked("killings"));
    }

    #[test]
    fn multi_word_entries_never_match() {
        // Split on single spaces yields "human" and "centipede", neither of
        // which is in the set on its own.
        assert!(!is_blocked("the human centipede"));
        assert!(!is_blocked("legs spread"));
    }

    #[test]
    fn punctuation_defeats_the_token_test() {
        assert!(!is_blocked("kill!"));
    }
}
