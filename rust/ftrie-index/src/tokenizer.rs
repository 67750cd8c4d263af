//! Byte-oriented tokenizer feeding the index builder.
//!
//! Text records are split into maximal runs of token bytes. ASCII letters and
//! digits are token bytes, as is every byte `>= 0x80`, so multi-byte UTF-8
//! sequences (valid or not) stay inside their token. All remaining ASCII
//! bytes (whitespace, punctuation and control characters) separate tokens.
//!
//! Positions count emitted tokens, starting at 0 for a fresh record or at a
//! caller-provided offset when a record continues the text of the previous one.

/// Default maximum token length in bytes. Longer tokens are not indexed.
pub const DEFAULT_MAX_TOKEN_LEN: usize = 96;

/// Returns `true` if `byte` belongs to a token rather than separating tokens.
#[inline]
pub fn is_token_byte(byte: u8) -> bool {
    byte >= 0x80 || byte.is_ascii_alphanumeric()
}

/// Splits text records into tokens, optionally folding ASCII letters to
/// lower case.
///
/// The tokenizer owns a scratch buffer that holds the folded token, so a
/// token handed out by [`TokenStream::next_token`] is only valid until the
/// stream is advanced again.
pub struct Tokenizer {
    case_fold: bool,
    scratch: Vec<u8>,
}

impl Tokenizer {
    pub fn new(case_fold: bool) -> Tokenizer {
        Tokenizer {
            case_fold,
            scratch: Vec::new(),
        }
    }

    pub fn case_fold(&self) -> bool {
        self.case_fold
    }

    /// Starts tokenizing a single text record.
    pub fn tokenize<'t, 'a>(&'t mut self, input: &'a [u8]) -> TokenStream<'t, 'a> {
        self.tokenize_at(input, 0)
    }

    /// Starts tokenizing `input` with the first token at `position`.
    pub fn tokenize_at<'t, 'a>(
        &'t mut self,
        input: &'a [u8],
        position: u32,
    ) -> TokenStream<'t, 'a> {
        TokenStream {
            input,
            cursor: 0,
            position,
            case_fold: self.case_fold,
            scratch: &mut self.scratch,
        }
    }
}

/// Lending stream of `(token, position)` pairs over one text record.
pub struct TokenStream<'t, 'a> {
    input: &'a [u8],
    cursor: usize,
    position: u32,
    case_fold: bool,
    scratch: &'t mut Vec<u8>,
}

impl TokenStream<'_, '_> {
    /// Returns `true` if another token is available.
    pub fn more(&self) -> bool {
        self.input[self.cursor..].iter().any(|&b| is_token_byte(b))
    }

    /// Position the next token will receive.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Advances to the next token and returns it with its position.
    ///
    /// The returned slice borrows the stream and is invalidated by the next
    /// call.
    pub fn next_token(&mut self) -> Option<(&[u8], u32)> {
        let input = self.input;
        let start = self.cursor
            + input[self.cursor..]
                .iter()
                .position(|&b| is_token_byte(b))?;
        let end = input[start..]
            .iter()
            .position(|&b| !is_token_byte(b))
            .map_or(input.len(), |len| start + len);
        self.cursor = end;

        let position = self.position;
        self.position += 1;

        let token = &input[start..end];
        if self.case_fold && token.iter().any(u8::is_ascii_uppercase) {
            self.scratch.clear();
            self.scratch.extend_from_slice(token);
            self.scratch.make_ascii_lowercase();
            Some((self.scratch.as_slice(), position))
        } else {
            Some((token, position))
        }
    }
}
