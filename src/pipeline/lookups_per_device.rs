use std::collections::{BTreeMap, HashMap};

use super::join::SessionGroups;
use super::key::{
    decode_count, decode_mac, encode_count, AddressKey, DeviceLookupKey, HourlyLookupKey, TraceKey,
};
use super::{Record, Stage, StoreManager, StoreReader, StoreWriter, Transform};
use crate::encoding::{Key as _, Value as _};
use crate::errinput;
use crate::error::Result;
use crate::trace::{hour_bucket_secs, Trace};

/// Counts DNS lookup events per (node, device, domain, hour).
///
/// Joins traces with their session's consistent ranges and address table.
/// A trace contributes only while inside a consistent range. Each
/// unanonymized A record domain, CNAME domain and CNAME cname is one
/// event; anonymized names cannot be attributed and are dropped. Events
/// resolve to a device through the address table entry for their address
/// id with the greatest sequence number at or before the trace's own.
pub struct CountLookups;

impl CountLookups {
    fn count_group(
        traces: &[Record],
        ranges: &[Record],
        addresses: &[Record],
        counts: &mut BTreeMap<Vec<u8>, i64>,
    ) -> Result<()> {
        let mut spans = Vec::with_capacity(ranges.len());
        for record in ranges {
            let first = TraceKey::decode(&record.key)?;
            let last = TraceKey::decode(&record.value)?;
            spans.push((first.sequence_number, last.sequence_number));
        }

        // Address mappings arrive sorted by (sequence, address id).
        let mut mappings = Vec::with_capacity(addresses.len());
        for record in addresses {
            let key = AddressKey::decode(&record.key)?;
            let mac = decode_mac(&record.value)?;
            mappings.push((key.sequence_number, key.address_id, mac));
        }

        // Device identifiers are sequence-point-specific: replay the
        // mapping stream as the trace sequence advances instead of caching
        // lookups across sequence numbers.
        let mut current: HashMap<i32, String> = HashMap::new();
        let mut next_mapping = 0;
        for record in traces {
            let key = TraceKey::decode(&record.key)?;
            let sequence = key.sequence_number;
            if !spans
                .iter()
                .any(|(first, last)| sequence >= *first && sequence <= *last)
            {
                continue;
            }
            while next_mapping < mappings.len() && mappings[next_mapping].0 <= sequence {
                let (_, address_id, mac) = &mappings[next_mapping];
                current.insert(*address_id, mac.clone());
                next_mapping += 1;
            }

            let trace = Trace::decode(&record.value)?;
            let hour = hour_bucket_secs(key.session_id, sequence);
            let mut tally = |address_id: i32, domain: &str| {
                if let Some(mac) = current.get(&address_id) {
                    let out_key = HourlyLookupKey {
                        node_id: key.node_id.clone(),
                        mac_address: mac.clone(),
                        domain: domain.to_string(),
                        hour_timestamp_secs: hour,
                    };
                    *counts.entry(out_key.encode()).or_insert(0) += 1;
                }
            };
            for a_record in &trace.a_records {
                if !a_record.anonymized {
                    tally(a_record.address_id, &a_record.domain);
                }
            }
            for cname_record in &trace.cname_records {
                if !cname_record.domain_anonymized {
                    tally(cname_record.address_id, &cname_record.domain);
                }
                if !cname_record.cname_anonymized {
                    tally(cname_record.address_id, &cname_record.cname);
                }
            }
        }
        Ok(())
    }
}

impl Transform for CountLookups {
    fn run(
        &mut self,
        inputs: &mut [Box<dyn StoreReader>],
        outputs: &mut [Box<dyn StoreWriter>],
    ) -> Result<()> {
        let [traces_input, ranges_input, addresses_input] = inputs else {
            return errinput!("count-lookups takes traces, ranges and address-table input stores");
        };
        let [output] = outputs else {
            return errinput!("count-lookups takes exactly one output store");
        };

        let mut traces = SessionGroups::new(traces_input.as_mut());
        let mut ranges = SessionGroups::new(ranges_input.as_mut());
        let mut addresses = SessionGroups::new(addresses_input.as_mut());

        // Aggregate keys don't follow session order, so counts are
        // buffered and flushed ascending once every session is consumed.
        let mut counts = BTreeMap::new();
        let mut range_group = ranges.next_group()?;
        let mut address_group = addresses.next_group()?;
        while let Some((session, trace_records)) = traces.next_group()? {
            while matches!(&range_group, Some(r) if r.0 < session) {
                range_group = ranges.next_group()?;
            }
            while matches!(&address_group, Some(a) if a.0 < session) {
                address_group = addresses.next_group()?;
            }
            let range_records = match &range_group {
                Some(r) if r.0 == session => r.1.as_slice(),
                _ => &[],
            };
            let address_records = match &address_group {
                Some(a) if a.0 == session => a.1.as_slice(),
                _ => &[],
            };
            Self::count_group(&trace_records, range_records, address_records, &mut counts)?;
        }

        for (key, count) in counts {
            output.write_record(Record {
                key,
                value: encode_count(count),
            })?;
        }
        Ok(())
    }
}

/// Sums the per-hour counts over their hour suffix into per-device
/// totals. Input and output are both ascending, so this streams.
pub struct RollupLookups;

impl Transform for RollupLookups {
    fn run(
        &mut self,
        inputs: &mut [Box<dyn StoreReader>],
        outputs: &mut [Box<dyn StoreWriter>],
    ) -> Result<()> {
        let [input] = inputs else {
            return errinput!("rollup-lookups takes exactly one input store");
        };
        let [output] = outputs else {
            return errinput!("rollup-lookups takes exactly one output store");
        };

        let mut current: Option<(Vec<u8>, i64)> = None;
        while let Some(record) = input.read_record()? {
            let key = HourlyLookupKey::decode(&record.key)?;
            let device_key = DeviceLookupKey {
                node_id: key.node_id,
                mac_address: key.mac_address,
                domain: key.domain,
            }
            .encode();
            let count = decode_count(&record.value)?;

            let flush = matches!(&current, Some((prefix, _)) if *prefix != device_key);
            if flush {
                if let Some((prefix, total)) = current.take() {
                    output.write_record(Record {
                        key: prefix,
                        value: encode_count(total),
                    })?;
                }
            }
            match &mut current {
                Some((_, total)) => *total += count,
                None => current = Some((device_key, count)),
            }
        }
        if let Some((prefix, total)) = current.take() {
            output.write_record(Record {
                key: prefix,
                value: encode_count(total),
            })?;
        }
        Ok(())
    }
}

/// Builds the two-stage aggregation: count lookup events per hour, then
/// roll the hourly counts up into per-device totals.
pub fn lookups_per_device_pipeline(manager: &dyn StoreManager) -> Vec<Stage> {
    vec![
        Stage::new("count-lookups-per-hour", CountLookups)
            .input(manager.reader("traces"))
            .input(manager.reader("consistent-ranges"))
            .input(manager.reader("address-id-table"))
            .output(manager.writer("lookups-per-device-per-hour")),
        Stage::new("rollup-lookups-per-device", RollupLookups)
            .input(manager.reader("lookups-per-device-per-hour"))
            .output(manager.writer("lookups-per-device")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::key::encode_mac;
    use crate::pipeline::run_pipeline;
    use crate::pipeline::slice::SliceManager;
    use crate::trace::{DnsARecord, DnsCnameRecord};

    fn a_record(address_id: i32, anonymized: bool, domain: &str) -> DnsARecord {
        DnsARecord {
            address_id,
            anonymized,
            domain: domain.to_string(),
        }
    }

    fn trace_record(key: &TraceKey, trace: &Trace) -> Record {
        Record {
            key: key.encode(),
            value: trace.encode(),
        }
    }

    fn range_record(node: &str, session_id: i64, first: i32, last: i32) -> Record {
        Record {
            key: TraceKey::new(node, "anon1", session_id, first).encode(),
            value: TraceKey::new(node, "anon1", session_id, last).encode(),
        }
    }

    fn address_record(
        node: &str,
        session_id: i64,
        sequence: i32,
        address_id: i32,
        mac: &str,
    ) -> Record {
        Record {
            key: AddressKey {
                node_id: node.to_string(),
                anonymization_context: "anon1".to_string(),
                session_id,
                sequence_number: sequence,
                address_id,
            }
            .encode(),
            value: encode_mac(mac),
        }
    }

    fn write_store(manager: &SliceManager, name: &str, records: Vec<Record>) {
        let mut writer = manager.writer(name);
        writer.begin_writing().unwrap();
        for record in records {
            writer.write_record(record).unwrap();
        }
        writer.end_writing().unwrap();
    }

    fn run(
        manager: &SliceManager,
        traces: Vec<Record>,
        ranges: Vec<Record>,
        addresses: Vec<Record>,
    ) {
        write_store(manager, "traces", traces);
        write_store(manager, "consistent-ranges", ranges);
        write_store(manager, "address-id-table", addresses);
        run_pipeline(lookups_per_device_pipeline(manager)).expect("pipeline failed");
    }

    fn read_per_device(manager: &SliceManager) -> Vec<(String, String, String, i64)> {
        let mut reader = manager.reader("lookups-per-device");
        reader.begin_reading().unwrap();
        let mut counts = Vec::new();
        while let Some(record) = reader.read_record().unwrap() {
            let key = DeviceLookupKey::decode(&record.key).unwrap();
            let count = decode_count(&record.value).unwrap();
            counts.push((key.node_id, key.mac_address, key.domain, count));
        }
        counts
    }

    fn read_per_hour(manager: &SliceManager) -> Vec<(String, String, String, i64, i64)> {
        let mut reader = manager.reader("lookups-per-device-per-hour");
        reader.begin_reading().unwrap();
        let mut counts = Vec::new();
        while let Some(record) = reader.read_record().unwrap() {
            let key = HourlyLookupKey::decode(&record.key).unwrap();
            let count = decode_count(&record.value).unwrap();
            counts.push((
                key.node_id,
                key.mac_address,
                key.domain,
                key.hour_timestamp_secs,
                count,
            ));
        }
        counts
    }

    fn entry(node: &str, mac: &str, domain: &str, count: i64) -> (String, String, String, i64) {
        (
            node.to_string(),
            mac.to_string(),
            domain.to_string(),
            count,
        )
    }

    fn hour_entry(
        node: &str,
        mac: &str,
        domain: &str,
        hour: i64,
        count: i64,
    ) -> (String, String, String, i64, i64) {
        (
            node.to_string(),
            mac.to_string(),
            domain.to_string(),
            hour,
            count,
        )
    }

    #[test]
    fn test_empty_inputs() {
        let manager = SliceManager::new();
        run(&manager, vec![], vec![], vec![]);

        assert!(read_per_device(&manager).is_empty());
        assert!(read_per_hour(&manager).is_empty());
    }

    #[test]
    fn test_one_a_record() {
        let manager = SliceManager::new();
        let trace = Trace {
            a_records: vec![a_record(0, false, "m.domain")],
            ..Trace::default()
        };
        run(
            &manager,
            vec![trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace)],
            vec![range_record("node1", 0, 0, 0)],
            vec![address_record("node1", 0, 0, 0, "mac1")],
        );

        assert_eq!(
            read_per_device(&manager),
            vec![entry("node1", "mac1", "m.domain", 1)]
        );
        assert_eq!(
            read_per_hour(&manager),
            vec![hour_entry("node1", "mac1", "m.domain", 0, 1)]
        );
    }

    #[test]
    fn test_cname_counts_both_names() {
        let manager = SliceManager::new();
        let trace = Trace {
            cname_records: vec![DnsCnameRecord {
                address_id: 0,
                domain_anonymized: false,
                domain: "m.domain1".to_string(),
                cname_anonymized: false,
                cname: "m.domain2".to_string(),
            }],
            ..Trace::default()
        };
        run(
            &manager,
            vec![trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace)],
            vec![range_record("node1", 0, 0, 0)],
            vec![address_record("node1", 0, 0, 0, "mac1")],
        );

        assert_eq!(
            read_per_device(&manager),
            vec![
                entry("node1", "mac1", "m.domain1", 1),
                entry("node1", "mac1", "m.domain2", 1),
            ]
        );
    }

    #[test]
    fn test_anonymized_names_are_dropped() {
        let manager = SliceManager::new();
        let trace = Trace {
            a_records: vec![a_record(0, true, "m.domain")],
            cname_records: vec![DnsCnameRecord {
                address_id: 0,
                domain_anonymized: true,
                domain: "m.domain1".to_string(),
                cname_anonymized: true,
                cname: "m.domain2".to_string(),
            }],
            ..Trace::default()
        };
        run(
            &manager,
            vec![trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace)],
            vec![range_record("node1", 0, 0, 0)],
            vec![address_record("node1", 0, 0, 0, "mac1")],
        );

        assert!(read_per_device(&manager).is_empty());
        assert!(read_per_hour(&manager).is_empty());
    }

    #[test]
    fn test_multiple_lookups_in_one_trace() {
        let manager = SliceManager::new();
        let trace = Trace {
            a_records: vec![
                a_record(0, false, "m.domain"),
                a_record(0, false, "m.domain"),
            ],
            ..Trace::default()
        };
        run(
            &manager,
            vec![trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace)],
            vec![range_record("node1", 0, 0, 0)],
            vec![address_record("node1", 0, 0, 0, "mac1")],
        );

        assert_eq!(
            read_per_device(&manager),
            vec![entry("node1", "mac1", "m.domain", 2)]
        );
    }

    #[test]
    fn test_multiple_addresses_resolve_independently() {
        let manager = SliceManager::new();
        let trace = Trace {
            a_records: vec![
                a_record(0, false, "m.domain1"),
                a_record(1, false, "m.domain2"),
            ],
            ..Trace::default()
        };
        run(
            &manager,
            vec![trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace)],
            vec![range_record("node1", 0, 0, 0)],
            vec![
                address_record("node1", 0, 0, 0, "mac1"),
                address_record("node1", 0, 0, 1, "mac2"),
            ],
        );

        assert_eq!(
            read_per_device(&manager),
            vec![
                entry("node1", "mac1", "m.domain1", 1),
                entry("node1", "mac2", "m.domain2", 1),
            ]
        );
    }

    #[test]
    fn test_multiple_traces_bucket_by_hour() {
        let manager = SliceManager::new();
        let trace = Trace {
            a_records: vec![a_record(0, false, "m.domain")],
            ..Trace::default()
        };
        run(
            &manager,
            vec![
                trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace),
                trace_record(&TraceKey::new("node1", "anon1", 0, 1), &trace),
                trace_record(&TraceKey::new("node1", "anon1", 0, 120), &trace),
            ],
            vec![range_record("node1", 0, 0, 120)],
            vec![address_record("node1", 0, 0, 0, "mac1")],
        );

        assert_eq!(
            read_per_device(&manager),
            vec![entry("node1", "mac1", "m.domain", 3)]
        );
        // Sequences 0 and 1 land in the first hour, sequence 120 starts
        // the next one.
        assert_eq!(
            read_per_hour(&manager),
            vec![
                hour_entry("node1", "mac1", "m.domain", 0, 2),
                hour_entry("node1", "mac1", "m.domain", 3600, 1),
            ]
        );
    }

    #[test]
    fn test_address_mappings_change_over_a_session() {
        let manager = SliceManager::new();
        let trace = Trace {
            a_records: vec![a_record(0, false, "m.domain")],
            ..Trace::default()
        };
        run(
            &manager,
            vec![
                trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace),
                trace_record(&TraceKey::new("node1", "anon1", 0, 1), &trace),
            ],
            vec![range_record("node1", 0, 0, 1)],
            vec![
                address_record("node1", 0, 0, 0, "mac1"),
                address_record("node1", 0, 1, 0, "mac2"),
            ],
        );

        assert_eq!(
            read_per_device(&manager),
            vec![
                entry("node1", "mac1", "m.domain", 1),
                entry("node1", "mac2", "m.domain", 1),
            ]
        );
    }

    #[test]
    fn test_unmapped_addresses_are_dropped() {
        let manager = SliceManager::new();
        let trace = Trace {
            a_records: vec![a_record(7, false, "m.domain")],
            ..Trace::default()
        };
        run(
            &manager,
            vec![trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace)],
            vec![range_record("node1", 0, 0, 0)],
            vec![address_record("node1", 0, 0, 0, "mac1")],
        );

        assert!(read_per_device(&manager).is_empty());
    }

    #[test]
    fn test_traces_outside_ranges_are_dropped() {
        let manager = SliceManager::new();
        let trace = Trace {
            a_records: vec![a_record(0, false, "m.domain")],
            ..Trace::default()
        };
        run(
            &manager,
            vec![
                trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace),
                trace_record(&TraceKey::new("node1", "anon1", 0, 5), &trace),
            ],
            vec![range_record("node1", 0, 0, 1)],
            vec![address_record("node1", 0, 0, 0, "mac1")],
        );

        assert_eq!(
            read_per_device(&manager),
            vec![entry("node1", "mac1", "m.domain", 1)]
        );
    }

    #[test]
    fn test_counts_are_conserved_across_outputs() {
        let manager = SliceManager::new();
        let trace = Trace {
            a_records: vec![
                a_record(0, false, "m.domain1"),
                a_record(0, false, "m.domain2"),
            ],
            ..Trace::default()
        };
        run(
            &manager,
            vec![
                trace_record(&TraceKey::new("node1", "anon1", 0, 0), &trace),
                trace_record(&TraceKey::new("node1", "anon1", 0, 200), &trace),
                trace_record(&TraceKey::new("node2", "anon1", 0, 0), &trace),
            ],
            vec![
                range_record("node1", 0, 0, 200),
                range_record("node2", 0, 0, 0),
            ],
            vec![
                address_record("node1", 0, 0, 0, "mac1"),
                address_record("node2", 0, 0, 0, "mac2"),
            ],
        );

        let per_device: i64 = read_per_device(&manager).iter().map(|e| e.3).sum();
        let per_hour: i64 = read_per_hour(&manager).iter().map(|e| e.4).sum();
        assert_eq!(per_device, per_hour);
        assert_eq!(per_device, 6);
    }
}
