use crate::constants;
use std::collections::HashMap;

/// Represents size limit of the stream to prevent DoS attacks.
///
/// Please refer [`Constraints`](./struct.Constraints.html) for more info.
#[derive(Debug, Clone)]
pub struct SizeLimit {
    pub(crate) whole_stream: u64,
    pub(crate) per_part: u64,
    pub(crate) part_map: HashMap<String, u64>,
}

impl SizeLimit {
    /// Creates a default size limit which is [`u64::MAX`] for the whole stream
    /// and for each part.
    pub fn new() -> SizeLimit {
        SizeLimit::default()
    }

    /// Sets size limit for the whole stream.
    pub fn whole_stream(mut self, limit: u64) -> SizeLimit {
        self.whole_stream = limit;
        self
    }

    /// Sets size limit for each part.
    pub fn per_part(mut self, limit: u64) -> SizeLimit {
        self.per_part = limit;
        self
    }

    /// Sets size limit for a specific part, it overrides the `per_part` value
    /// for this part.
    ///
    /// It is useful when you want to set a size limit on a textual field which
    /// will be stored in memory to avoid potential DoS attacks from attackers
    /// running the server out of memory.
    pub fn for_part<N: Into<String>>(mut self, part_name: N, limit: u64) -> SizeLimit {
        self.part_map.insert(part_name.into(), limit);
        self
    }

    pub(crate) fn extract_size_limit_for(&self, part: Option<&str>) -> u64 {
        part.and_then(|part| self.part_map.get(part))
            .copied()
            .unwrap_or(self.per_part)
    }
}

impl Default for SizeLimit {
    fn default() -> Self {
        SizeLimit {
            whole_stream: constants::DEFAULT_WHOLE_STREAM_SIZE_LIMIT,
            per_part: constants::DEFAULT_PER_PART_SIZE_LIMIT,
            part_map: HashMap::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_size_limit_for() {
        let limit = SizeLimit::new().per_part(100).for_part("avatar", 10);

        assert_eq!(limit.extract_size_limit_for(Some("avatar")), 10);
        assert_eq!(limit.extract_size_limit_for(Some("bio")), 100);
        assert_eq!(limit.extract_size_limit_for(None), 100);
        assert_eq!(limit.whole_stream, u64::MAX);
    }
}
