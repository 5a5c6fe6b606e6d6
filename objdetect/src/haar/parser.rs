//! Reader for the parenthesized cascade description format.
//!
//! ```text
//! Cascade        := "(hcsb " width height stageCount Stage* ")"
//! Stage          := "(hcs " weakCount WeakClassifier* threshold ")"
//! WeakClassifier := "(hwcs " Feature threshold a b width height ")"
//! Feature        := "(hf " Rect Rect Rect tiltFlag ")"
//! Rect           := "(hr " x y w h weight ")"
//! ```
//!
//! Integers are signed decimal and end at the first character that is not a
//! digit (or the leading `-`). That terminator is consumed with the number:
//! when another integer follows, any terminator is accepted; when a literal
//! follows, the terminator must be whitespace or the literal's first
//! character (so `(hr 0 0 4 4 1)` closes on the `)` that ended the weight).

use super::cascade::HaarCascade;
use super::feature::{Feature, FeatureId};
use super::rect::HaarRect;
use super::stage::StumpStage;
use super::weak::Stump;
use crate::{ObjdetectError, Result};
use std::fs::File;
use std::io::{BufReader, Bytes, Read};
use std::path::Path;
use std::str::FromStr;

/// What to do with features whose tilt flag is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TiltedPolicy {
    /// Load and evaluate them as upright features, logging a warning.
    #[default]
    Ignore,
    /// Fail the load with a parse error.
    Reject,
}

/// Options of [`parse_cascade_with`].
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Handling of features with the tilt flag set.
    pub tilted: TiltedPolicy,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tilted-feature policy.
    pub fn with_tilted_policy(mut self, tilted: TiltedPolicy) -> Self {
        self.tilted = tilted;
        self
    }
}

/// Parse a stump-base cascade description with the default options.
///
/// # Errors
///
/// [`ObjdetectError::TruncatedInput`] if the input ends inside the
/// description, [`ObjdetectError::Parse`] for any other malformed or
/// out-of-range token, and [`ObjdetectError::Io`] if reading fails.
pub fn parse_cascade<R: Read>(reader: R) -> Result<HaarCascade> {
    parse_cascade_with(reader, &ParseOptions::default())
}

/// Parse a stump-base cascade description.
///
/// # Errors
///
/// As [`parse_cascade`]. With [`TiltedPolicy::Reject`] a set tilt flag is
/// also a [`ObjdetectError::Parse`].
pub fn parse_cascade_with<R: Read>(reader: R, options: &ParseOptions) -> Result<HaarCascade> {
    let mut parser = Parser {
        lexer: Lexer::new(reader),
        options,
        features: Vec::new(),
        tilted: 0,
        window: (0, 0),
    };
    let cascade = parser.cascade()?;

    #[cfg(feature = "tracing")]
    {
        if parser.tilted > 0 {
            tracing::warn!(
                tilted = parser.tilted,
                "cascade has tilted features; evaluating them as upright rectangles"
            );
        }
        tracing::debug!(
            width = cascade.width(),
            height = cascade.height(),
            stages = cascade.stage_count(),
            features = cascade.features().len(),
            "loaded haar cascade"
        );
    }

    Ok(cascade)
}

impl HaarCascade {
    /// Load a cascade description from disk.
    ///
    /// # Errors
    ///
    /// [`ObjdetectError::Io`] if the file cannot be opened or read, otherwise
    /// the errors of [`parse_cascade`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with(path, &ParseOptions::default())
    }

    /// Load a cascade description from disk with explicit options.
    ///
    /// # Errors
    ///
    /// As [`HaarCascade::from_file`] and [`parse_cascade_with`].
    pub fn from_file_with(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        parse_cascade_with(file, options)
    }
}

impl FromStr for HaarCascade {
    type Err = ObjdetectError;

    fn from_str(s: &str) -> Result<Self> {
        parse_cascade(s.as_bytes())
    }
}

struct Lexer<R: Read> {
    bytes: Bytes<BufReader<R>>,
    peeked: Option<u8>,
    position: usize,
    /// Terminator of the last integer and its position, not yet matched.
    pending: Option<(u8, usize)>,
}

impl<R: Read> Lexer<R> {
    fn new(reader: R) -> Self {
        Self {
            bytes: BufReader::new(reader).bytes(),
            peeked: None,
            position: 0,
            pending: None,
        }
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        if self.peeked.is_none() {
            self.peeked = self.bytes.next().transpose()?;
        }
        Ok(self.peeked)
    }

    fn bump(&mut self) -> Result<Option<u8>> {
        let b = self.peek()?;
        if b.is_some() {
            self.peeked = None;
            self.position += 1;
        }
        Ok(b)
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while matches!(self.peek()?, Some(b) if b.is_ascii_whitespace()) {
            self.bump()?;
        }
        Ok(())
    }

    fn truncated(&self) -> ObjdetectError {
        ObjdetectError::TruncatedInput {
            position: self.position,
        }
    }

    /// Match `literal`, honoring a pending integer terminator.
    fn expect(&mut self, literal: &'static str) -> Result<()> {
        let mut rest = literal.as_bytes();
        match self.pending.take() {
            Some((t, _)) if t.is_ascii_whitespace() => self.skip_whitespace()?,
            Some((t, _)) if t == rest[0] => rest = &rest[1..],
            Some((t, at)) => return Err(parse_error(literal, describe(t), at)),
            None => self.skip_whitespace()?,
        }

        for &want in rest {
            let at = self.position;
            match self.bump()? {
                Some(b) if b == want => {}
                Some(b) => return Err(parse_error(literal, describe(b), at)),
                None => return Err(self.truncated()),
            }
        }
        Ok(())
    }

    /// Read a signed decimal integer. Its terminator is left pending.
    fn int(&mut self) -> Result<i32> {
        self.pending = None;
        self.skip_whitespace()?;

        let start = self.position;
        let mut text = String::new();
        if self.peek()? == Some(b'-') {
            self.bump()?;
            text.push('-');
        }

        loop {
            let at = self.position;
            match self.bump()? {
                Some(b) if b.is_ascii_digit() => text.push(b as char),
                Some(t) => {
                    if text.is_empty() || text == "-" {
                        return Err(parse_error("integer", describe(t), at));
                    }
                    let value = text
                        .parse::<i32>()
                        .map_err(|_| parse_error("32-bit integer", text.clone(), start))?;
                    self.pending = Some((t, at));
                    return Ok(value);
                }
                None => return Err(self.truncated()),
            }
        }
    }

    fn count(&mut self, what: &'static str) -> Result<usize> {
        let start = self.position;
        let value = self.int()?;
        usize::try_from(value)
            .map_err(|_| parse_error(what, value.to_string(), start))
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_whitespace()?;
        let at = self.position;
        match self.bump()? {
            None => Ok(()),
            Some(b) => Err(parse_error("end of input", describe(b), at)),
        }
    }
}

struct Parser<'o, R: Read> {
    lexer: Lexer<R>,
    options: &'o ParseOptions,
    features: Vec<Feature>,
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    tilted: usize,
    window: (u32, u32),
}

impl<R: Read> Parser<'_, R> {
    fn cascade(&mut self) -> Result<HaarCascade> {
        self.lexer.expect("(hcsb ")?;
        let width = self.lexer.count("positive window width")?;
        let height = self.lexer.count("positive window height")?;
        if width == 0 || height == 0 {
            return Err(parse_error(
                "positive window size",
                format!("{width}x{height}"),
                self.lexer.position,
            ));
        }
        self.window = (width as u32, height as u32);

        let stage_count = self.lexer.count("stage count")?;
        let mut stages = Vec::new();
        for _ in 0..stage_count {
            stages.push(self.stage()?);
        }
        self.lexer.expect(")")?;
        self.lexer.expect_end()?;

        let features = std::mem::take(&mut self.features);
        HaarCascade::stump_based(self.window.0, self.window.1, features, stages)
    }

    fn stage(&mut self) -> Result<StumpStage> {
        self.lexer.expect("(hcs ")?;
        let weak_count = self.lexer.count("weak classifier count")?;
        let mut stumps = Vec::new();
        for _ in 0..weak_count {
            stumps.push(self.weak_classifier()?);
        }
        let threshold = self.lexer.int()?;
        self.lexer.expect(")")?;
        Ok(StumpStage::new(stumps, threshold))
    }

    fn weak_classifier(&mut self) -> Result<Stump> {
        self.lexer.expect("(hwcs ")?;
        let feature = self.feature()?;
        let threshold = self.lexer.int()?;
        let a = self.lexer.int()?;
        let b = self.lexer.int()?;
        let window_at = self.lexer.position;
        let width = self.lexer.int()?;
        let height = self.lexer.int()?;
        self.lexer.expect(")")?;

        let stump = Stump::new(feature, threshold, a, b, width, height);
        let (ww, wh) = self.window;
        if !stump.window_fits(ww, wh) {
            return Err(parse_error(
                "stump window inside the cascade window",
                format!("{width}x{height} in {ww}x{wh}"),
                window_at,
            ));
        }
        Ok(stump)
    }

    fn feature(&mut self) -> Result<FeatureId> {
        self.lexer.expect("(hf ")?;
        let rects = [self.rect()?, self.rect()?, self.rect()?];
        let flag_at = self.lexer.position;
        let tilted = self.lexer.int()? != 0;
        self.lexer.expect(")")?;

        if tilted {
            if self.options.tilted == TiltedPolicy::Reject {
                return Err(parse_error("upright feature (tilt flag 0)", "tilted".into(), flag_at));
            }
            self.tilted += 1;
        }

        self.features.push(Feature::new(rects, tilted));
        Ok(FeatureId(self.features.len() - 1))
    }

    fn rect(&mut self) -> Result<HaarRect> {
        self.lexer.expect("(hr ")?;
        let start = self.lexer.position;
        let x = self.lexer.int()?;
        let y = self.lexer.int()?;
        let w = self.lexer.int()?;
        let h = self.lexer.int()?;
        let weight = self.lexer.int()?;
        self.lexer.expect(")")?;

        let (ww, wh) = self.window;
        let rect = HaarRect::new(x, y, w, h, weight).map_err(|_| {
            parse_error("non-negative rectangle geometry", format!("({x}, {y}, {w}, {h})"), start)
        })?;
        if !rect.fits(ww, wh) {
            return Err(parse_error(
                "rectangle inside the cascade window",
                format!("({x}, {y}, {w}, {h}) in {ww}x{wh}"),
                start,
            ));
        }
        Ok(rect)
    }
}

fn parse_error(expected: &str, found: String, position: usize) -> ObjdetectError {
    ObjdetectError::Parse {
        expected: expected.to_string(),
        found,
        position,
    }
}

fn describe(b: u8) -> String {
    format!("'{}'", (b as char).escape_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_STAGE: &str = "(hcsb 24 24 1 (hcs 1 (hwcs (hf (hr 0 0 24 12 1)(hr 0 12 24 12 -1)(hr 0 0 0 0 0)0)1000 -1 1 24 24)1))";

    #[test]
    fn parses_canonical_description() {
        let cascade: HaarCascade = ONE_STAGE.parse().unwrap();
        assert_eq!((cascade.width(), cascade.height()), (24, 24));
        assert_eq!(cascade.stage_count(), 1);
        assert_eq!(cascade.features().len(), 1);

        let stages = cascade.stump_stages().unwrap();
        let stump = stages[0].stumps()[0];
        assert_eq!(stump.threshold(), 1000);
        assert_eq!(stump.values(), (-1, 1));
        assert_eq!(stump.window(), (24, 24));
        assert_eq!(stages[0].threshold(), 1);

        let rects = cascade.features()[0].rects();
        assert_eq!(rects[1].y(), 12);
        assert_eq!(rects[1].weight(), -1);
    }

    #[test]
    fn tolerates_newlines_and_spaced_closers() {
        let text = "(hcsb 24 24 1\n  (hcs 1\n    (hwcs (hf (hr 0 0 24 12 1 ) (hr 0 12 24 12 -1 )\n      (hr 0 0 0 0 0 ) 0 ) 1000 -1 1 24 24 )\n  1 )\n)\n";
        let cascade: HaarCascade = text.parse().unwrap();
        assert_eq!(cascade.features().len(), 1);
    }

    #[test]
    fn integer_terminators_between_numbers_are_not_checked() {
        let text = "(hcsb 24,24;0 )";
        let cascade: HaarCascade = text.parse().unwrap();
        assert_eq!((cascade.width(), cascade.height()), (24, 24));
        assert_eq!(cascade.stage_count(), 0);
    }

    #[test]
    fn terminator_before_literal_must_fit() {
        let err = "(hcsb 24 24 0x".parse::<HaarCascade>().unwrap_err();
        match err {
            ObjdetectError::Parse { expected, found, position } => {
                assert_eq!(expected, ")");
                assert_eq!(found, "'x'");
                assert_eq!(position, 13);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn lone_minus_is_not_an_integer() {
        let err = "(hcsb - 24 0 )".parse::<HaarCascade>().unwrap_err();
        assert!(matches!(err, ObjdetectError::Parse { position: 7, .. }));
    }

    #[test]
    fn overflowing_integer() {
        let err = "(hcsb 99999999999 24 0 )".parse::<HaarCascade>().unwrap_err();
        assert!(matches!(err, ObjdetectError::Parse { position: 6, .. }));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let err = "(hcsb 24 24 -1 )".parse::<HaarCascade>().unwrap_err();
        assert!(matches!(err, ObjdetectError::Parse { .. }));
    }

    #[test]
    fn tree_base_token_is_not_supported() {
        let err = "(hcst 24 24 0 )".parse::<HaarCascade>().unwrap_err();
        assert!(matches!(err, ObjdetectError::Parse { position: 4, .. }));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!("(hcsb 24 24 0 )\n\n".parse::<HaarCascade>().is_ok());
        let err = "(hcsb 24 24 0 ) (".parse::<HaarCascade>().unwrap_err();
        assert!(matches!(err, ObjdetectError::Parse { position: 16, .. }));
    }

    #[test]
    fn rectangles_outside_the_window_are_rejected() {
        let text = ONE_STAGE.replace("(hr 0 12 24 12 -1)", "(hr 0 13 24 12 -1)");
        let err = text.parse::<HaarCascade>().unwrap_err();
        assert!(matches!(err, ObjdetectError::Parse { .. }));
    }

    #[test]
    fn tilted_policy() {
        let tilted = ONE_STAGE.replace("(hr 0 0 0 0 0)0)", "(hr 0 0 0 0 0)1)");

        let cascade: HaarCascade = tilted.parse().unwrap();
        assert!(cascade.features()[0].is_tilted());

        let strict = ParseOptions::new().with_tilted_policy(TiltedPolicy::Reject);
        let err = parse_cascade_with(tilted.as_bytes(), &strict).unwrap_err();
        assert!(matches!(err, ObjdetectError::Parse { .. }));
    }
}
