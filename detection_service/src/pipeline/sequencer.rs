use regex::Regex;
use std::{num::ParseIntError, sync::OnceLock};

fn frame_pattern() -> &'static Regex {
    static FRAME_RE: OnceLock<Regex> = OnceLock::new();
    FRAME_RE.get_or_init(|| Regex::new(r"frame_([0-9]+)\.jpg").expect("valid frame pattern"))
}

/// Extracts the ordinal from the first `frame_<digits>.jpg` found anywhere in
/// `path`. Only ASCII digits count. `Ok(None)` when the path does not follow
/// that naming, `Err` only when the ordinal overflows `u64`.
pub fn frame_number(path: &str) -> Result<Option<u64>, ParseIntError> {
    frame_pattern()
        .captures(path)
        .map(|caps| caps[1].parse::<u64>())
        .transpose()
}

/// Like [`frame_number`] but paths without an ordinal sort as frame 0.
pub fn frame_number_or_default(path: &str) -> Result<u64, ParseIntError> {
    Ok(frame_number(path)?.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_frame_number_anywhere_in_path() {
        assert_eq!(frame_number("frame_12.jpg"), Ok(Some(12)));
        assert_eq!(
            frame_number("/data/video_3/frames/frame_0042.jpg"),
            Ok(Some(42))
        );
        assert_eq!(frame_number("clip_frame_7.jpg.bak"), Ok(Some(7)));
    }

    #[test]
    fn test_non_matching_paths() {
        assert_eq!(frame_number("snapshot.jpg"), Ok(None));
        assert_eq!(frame_number("frame_12.png"), Ok(None));
        assert_eq!(frame_number("Frame_12.jpg"), Ok(None));
        assert_eq!(frame_number("frame_12xjpg"), Ok(None));
        assert_eq!(frame_number_or_default("snapshot.jpg"), Ok(0));
    }

    #[test]
    fn test_non_ascii_digits_do_not_match() {
        assert_eq!(frame_number("frames/frame_١٢.jpg"), Ok(None));
        assert_eq!(frame_number_or_default("frames/frame_١٢.jpg"), Ok(0));
        assert_eq!(frame_number("frame_١٢.jpg/frame_3.jpg"), Ok(Some(3)));
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(frame_number("frame_2.jpg/frame_9.jpg"), Ok(Some(2)));
    }

    #[test]
    fn test_overflowing_ordinal_is_an_error() {
        assert!(frame_number("frame_99999999999999999999999.jpg").is_err());
    }
}
