use std::cmp::Ordering;

use super::join::SessionGroups;
use super::key::TraceKey;
use super::{Record, Stage, StoreManager, StoreReader, StoreWriter, Transform};
use crate::encoding::Key as _;
use crate::errinput;
use crate::error::Result;
use crate::trace::trace_timestamp_microseconds;

/// Selects traces whose session has a consistent range overlapping a time
/// window. A range `[first, last]` in session `s` covers the wall-clock
/// span of its first and last traces; ranges whose span misses the window
/// are dropped along with their traces.
pub struct FilterSessions {
    start_microseconds: i64,
    end_microseconds: i64,
}

impl FilterSessions {
    /// A half-open window `[start_secs, end_secs)` in seconds since the
    /// epoch.
    pub fn new(start_secs: i64, end_secs: i64) -> Self {
        Self {
            start_microseconds: start_secs * 1_000_000,
            end_microseconds: end_secs * 1_000_000,
        }
    }

    fn emit_group(
        &self,
        traces: &[Record],
        ranges: &[Record],
        output: &mut dyn StoreWriter,
    ) -> Result<()> {
        for range in ranges {
            let first = TraceKey::decode(&range.key)?;
            let last = TraceKey::decode(&range.value)?;
            let first_ts = trace_timestamp_microseconds(first.session_id, first.sequence_number);
            let last_ts = trace_timestamp_microseconds(last.session_id, last.sequence_number);
            if first_ts > self.end_microseconds || last_ts < self.start_microseconds {
                continue;
            }
            for record in traces {
                let key = TraceKey::decode(&record.key)?;
                if key.sequence_number >= first.sequence_number
                    && key.sequence_number <= last.sequence_number
                {
                    output.write_record(record.clone())?;
                }
            }
        }
        Ok(())
    }
}

impl Transform for FilterSessions {
    fn run(
        &mut self,
        inputs: &mut [Box<dyn StoreReader>],
        outputs: &mut [Box<dyn StoreWriter>],
    ) -> Result<()> {
        let [traces_input, ranges_input] = inputs else {
            return errinput!("filter-sessions takes traces and ranges input stores");
        };
        let [output] = outputs else {
            return errinput!("filter-sessions takes exactly one output store");
        };

        let mut traces = SessionGroups::new(traces_input.as_mut());
        let mut ranges = SessionGroups::new(ranges_input.as_mut());
        let mut trace_group = traces.next_group()?;
        let mut range_group = ranges.next_group()?;
        loop {
            let (Some(t), Some(r)) = (&trace_group, &range_group) else {
                break;
            };
            match t.0.cmp(&r.0) {
                Ordering::Less => trace_group = traces.next_group()?,
                Ordering::Greater => range_group = ranges.next_group()?,
                Ordering::Equal => {
                    self.emit_group(&t.1, &r.1, output.as_mut())?;
                    trace_group = traces.next_group()?;
                    range_group = ranges.next_group()?;
                }
            }
        }
        Ok(())
    }
}

/// Builds the one-stage pipeline reading `traces` and `trace-key-ranges`
/// and writing `filtered-traces`.
pub fn filter_sessions_pipeline(
    start_secs: i64,
    end_secs: i64,
    manager: &dyn StoreManager,
) -> Vec<Stage> {
    vec![
        Stage::new("filter-sessions", FilterSessions::new(start_secs, end_secs))
            .input(manager.reader("traces"))
            .input(manager.reader("trace-key-ranges"))
            .output(manager.writer("filtered-traces")),
    ]
}
