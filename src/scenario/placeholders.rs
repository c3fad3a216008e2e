use rand::Rng;
use rand::seq::SliceRandom;

pub const NAMES: &[&str] = &[
    "Roberto", "Blake", "Carson", "Ali", "Sundar", "Suresh", "Surpreet", "Yinbang", "Cal", "Maria",
    "David", "Aisha", "Kenji",
];

pub const PLACES: &[&str] = &[
    "Chicago, IL",
    "Seattle, WA",
    "Indianapolis, IN",
    "Pittsburgh, PA",
    "Baltimore, MD",
    "Portland, OR",
    "Portland, ME",
    "Frankfort, KY",
    "Louisville, KY",
    "Nashville, TN",
    "Raleigh, NC",
];

/// Real words mixed with nonsense and near-miss words, so the dictionary
/// tool has something to reject.
pub const ENGLISH_WORDS: &[&str] = &[
    "Apple",
    "Boredom",
    "Borogoves",
    "Brillig",
    "Cacophony",
    "Concrete",
    "Dystopian",
    "Eledricious",
    "Ephemeral",
    "Flummox",
    "Gargantuan",
    "Gimble",
    "Gyrattable",
    "Halcyon",
    "Incandescent",
    "Juxtaposition",
    "Kaleidoscope",
    "Labyrinth",
    "Manxome",
    "Mellifluous",
    "Mimserable",
    "Nefarious",
    "Onomatopoeia",
    "Parameter",
    "Pulsameter",
    "Quintessential",
    "Quixotic",
    "Rabblerouser",
    "Serendipity",
    "Slithy",
    "Standoffish",
    "Tesseract",
    "Toves",
    "Ubiquitous",
    "Vicarious",
    "Wabe",
    "Wanderlust",
    "Xylophone",
    "Yare",
    "Zephyr",
];

/// Placeholder token → candidate replacements, applied in this order.
pub const DEFAULT_REPLACEMENTS: &[(&str, &[&str])] = &[
    (":NAME", NAMES),
    (":PLACE", PLACES),
    (":ENGLISH_WORD", ENGLISH_WORDS),
];

/// Replace every placeholder occurrence with a random pick from its list.
///
/// Picks come from a shuffled pool per placeholder, so repeats only happen
/// once the pool has been used up and refilled. A placeholder with an empty
/// list is left in place.
pub fn fill_placeholders<R: Rng + ?Sized>(
    text: &str,
    replacements: &[(&str, &[&str])],
    rng: &mut R,
) -> String {
    let mut filled = text.to_string();

    for &(placeholder, words) in replacements {
        if placeholder.is_empty() || words.is_empty() {
            continue;
        }

        let mut pool: Vec<&str> = Vec::new();
        let mut search_from = 0;
        while let Some(offset) = filled[search_from..].find(placeholder) {
            if pool.is_empty() {
                pool.extend_from_slice(words);
                pool.shuffle(rng);
            }
            let Some(word) = pool.pop() else { break };

            let start = search_from + offset;
            filled.replace_range(start..start + placeholder.len(), word);
            search_from = start + word.len();
        }
    }

    filled
}
