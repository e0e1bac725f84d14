use crate::{Error, Result};

/// A single satisfiable byte range over a file of known size. Both ends are
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: u64,
    pub end: u64,
}

impl RangeRequest {
    /// Parses a `Range` header value such as `bytes=0-99`, `bytes=500-` or
    /// `bytes=-200`.
    ///
    /// Fails with [`Error::MalformedRange`] for anything that can't be served
    /// as one partial response: other units, multiple ranges, garbage, or a
    /// start past the end of the file. An end past the file is clamped to the
    /// last byte.
    pub fn parse(header: &str, size: u64) -> Result<Self> {
        Self::parse_opt(header, size).ok_or_else(|| Error::MalformedRange(header.to_owned()))
    }

    fn parse_opt(header: &str, size: u64) -> Option<Self> {
        if size == 0 {
            return None;
        }
        let spec = header.trim().strip_prefix("bytes=")?;
        if spec.contains(',') {
            return None;
        }
        let (start, end) = spec.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());
        let last = size - 1;

        if start.is_empty() {
            let suffix: u64 = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            return Some(Self {
                start: size.saturating_sub(suffix),
                end: last,
            });
        }

        let start: u64 = start.parse().ok()?;
        let end = match end {
            "" => last,
            end => end.parse::<u64>().ok()?.min(last),
        };
        if start > end {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u64, end: u64) -> Option<RangeRequest> {
        Some(RangeRequest { start, end })
    }

    fn parse(header: &str, size: u64) -> Option<RangeRequest> {
        RangeRequest::parse(header, size).ok()
    }

    #[test]
    fn test_explicit_range() {
        let range = parse("bytes=0-99", 1000);
        assert_eq!(range, r(0, 99));
        let range = range.unwrap();
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range(1000), "bytes 0-99/1000");
    }

    #[test]
    fn test_open_ended_and_suffix() {
        assert_eq!(parse("bytes=500-", 1000), r(500, 999));
        assert_eq!(parse("bytes=-200", 1000), r(800, 999));
        assert_eq!(parse("bytes=-5000", 1000), r(0, 999));
        assert_eq!(parse("bytes=999-999", 1000), r(999, 999));
    }

    #[test]
    fn test_end_is_clamped() {
        assert_eq!(parse("bytes=900-5000", 1000), r(900, 999));
    }

    #[test]
    fn test_unusable_ranges() {
        for header in [
            "bytes=1000-",
            "bytes=1000-1200",
            "bytes=50-10",
            "bytes=-0",
            "bytes=0-10,20-30",
            "items=0-10",
            "bytes=abc-10",
            "bytes=10-abc",
            "bytes=",
            "bytes=-",
            "0-10",
        ] {
            let err = RangeRequest::parse(header, 1000).unwrap_err();
            assert!(
                matches!(&err, Error::MalformedRange(h) if h == header),
                "{header}: {err:?}"
            );
        }
    }

    #[test]
    fn test_empty_file_has_no_ranges() {
        assert_eq!(parse("bytes=0-", 0), None);
    }
}
