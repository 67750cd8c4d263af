//! Synthetic corpus generation.
//!
//! Corpora are generated from a seed so failures can be reproduced. Next to
//! the records, [`expected_postings`] computes the postings an index built
//! from them must contain, using a straightforward model of the tokenizer.

use std::collections::BTreeMap;

/// Parameters of a generated corpus.
#[derive(Debug, Clone)]
pub struct CorpusParams {
    pub seed: u64,
    pub records: usize,
    /// Number of distinct base words to draw from.
    pub vocabulary: usize,
    /// Maximum number of words per record.
    pub max_words: usize,
    /// Maximum length of a base word in characters.
    pub max_word_len: usize,
}

impl Default for CorpusParams {
    fn default() -> Self {
        CorpusParams {
            seed: 42,
            records: 200,
            vocabulary: 300,
            max_words: 24,
            max_word_len: 12,
        }
    }
}

const SEPARATORS: &[&[u8]] = &[b" ", b"  ", b", ", b". ", b"-", b"\t", b"\n", b"!?"];

/// Generates `(pre, text)` records.
///
/// Words mix ASCII letters in both cases, digits and a few multi-byte UTF-8
/// characters. Many words share prefixes, so the resulting trie has plenty of
/// inner nodes and splits. Pre values never decrease and have gaps; runs of
/// records share a pre value.
pub fn generate_corpus(params: &CorpusParams) -> Vec<(u32, Vec<u8>)> {
    let mut rng = fastrand::Rng::with_seed(params.seed);
    let vocabulary = generate_vocabulary(&mut rng, params);

    let mut pre = 0u32;
    (0..params.records)
        .map(|_| {
            pre += rng.u32(0..3);
            let words = rng.usize(0..=params.max_words);
            let mut text = Vec::new();
            if rng.bool() {
                text.extend_from_slice(SEPARATORS[rng.usize(..SEPARATORS.len())]);
            }
            for i in 0..words {
                if i > 0 {
                    text.extend_from_slice(SEPARATORS[rng.usize(..SEPARATORS.len())]);
                }
                let word = &vocabulary[rng.usize(..vocabulary.len())];
                text.extend(word.iter().map(|&b| {
                    if b.is_ascii_lowercase() && rng.u8(..8) == 0 {
                        b.to_ascii_uppercase()
                    } else {
                        b
                    }
                }));
            }
            (pre, text)
        })
        .collect()
}

fn generate_vocabulary(rng: &mut fastrand::Rng, params: &CorpusParams) -> Vec<Vec<u8>> {
    const EXTRA: &[&str] = &["é", "ß", "ж", "中"];
    let mut vocabulary: Vec<Vec<u8>> = Vec::with_capacity(params.vocabulary.max(1));
    while vocabulary.len() < params.vocabulary.max(1) {
        // Extend an existing word half of the time to produce shared prefixes.
        let mut word = if !vocabulary.is_empty() && rng.bool() {
            let base = &vocabulary[rng.usize(..vocabulary.len())];
            base[..rng.usize(1..=base.len())].to_vec()
        } else {
            Vec::new()
        };
        let extra = rng.usize(1..=params.max_word_len.max(1));
        for _ in 0..extra {
            match rng.u8(..20) {
                0 => word.extend_from_slice(EXTRA[rng.usize(..EXTRA.len())].as_bytes()),
                1 | 2 => word.push(rng.u8(b'0'..=b'9')),
                _ => word.push(rng.u8(b'a'..=b'z')),
            }
        }
        vocabulary.push(word);
    }
    vocabulary
}

/// Computes the expected postings of every token in `records`.
///
/// Tokens are maximal runs of ASCII alphanumerics and bytes `>= 0x80`.
/// Positions run across consecutive records with the same pre value.
/// Tokens longer than `max_token_len` are omitted but keep their position.
pub fn expected_postings(
    records: &[(u32, Vec<u8>)],
    case_fold: bool,
    max_token_len: usize,
) -> BTreeMap<Vec<u8>, Vec<(u32, u32)>> {
    let mut postings: BTreeMap<Vec<u8>, Vec<(u32, u32)>> = BTreeMap::new();
    let mut last_pre = None;
    let mut next_pos = 0u32;
    for (pre, text) in records {
        if last_pre != Some(*pre) {
            last_pre = Some(*pre);
            next_pos = 0;
        }
        let words = text
            .split(|&b| !(b >= 0x80 || b.is_ascii_alphanumeric()))
            .filter(|w| !w.is_empty());
        for word in words {
            let pos = next_pos;
            next_pos += 1;
            if word.len() > max_token_len {
                continue;
            }
            let token = if case_fold {
                word.to_ascii_lowercase()
            } else {
                word.to_vec()
            };
            postings.entry(token).or_default().push((*pre, pos));
        }
    }
    postings
}
