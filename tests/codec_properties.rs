//! Property tests for the document codec and record normalization.

use proptest::prelude::*;

use radio_device_store::store::codec::{decode, encode};
use radio_device_store::store::record::{DeviceId, DeviceRecord, FieldMap, FieldName};
use radio_device_store::store::validation::{LIMITS, check_limits, normalize};

fn field_map() -> impl Strategy<Value = FieldMap> {
    // Keys stay clear of brackets; values may hold `[` but never `]` or a line break.
    prop::collection::btree_map("[A-Za-z0-9_ .#:-]{0,12}", "[^\\]\n\r]{0,12}", 0..8)
}

fn raw_value() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i64>().prop_map(|v| v.to_string()),
        (-100_i64..100_100).prop_map(|v| v.to_string()),
        "[^\\]\n\r]{0,8}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Mappings without `]` in keys or values survive a round trip.
    #[test]
    fn decode_inverts_encode(map in field_map()) {
        prop_assert_eq!(decode(&encode(&map)), map);
    }

    /// Normalization always yields integer telemetry and a valid alert level.
    #[test]
    fn normalize_never_leaves_invalid_values(
        values in prop::collection::vec(raw_value(), 5),
        alert in "[A-Za-z]{0,9}",
    ) {
        let mut fields = FieldMap::new();
        for (field, value) in FieldName::TELEMETRY.iter().zip(&values) {
            fields.insert(field.wire_name().to_string(), value.clone());
        }
        fields.insert("Alert".to_string(), alert);

        let id = DeviceId::parse("prop").unwrap();
        let record = normalize(id, &fields, &[], "t0");
        for field in FieldName::TELEMETRY {
            prop_assert!(record.field(field).parse::<i64>().is_ok());
        }
        let level = record.field(FieldName::Alert);
        prop_assert!(["Info", "Warning", "Error", "Severe", "Critical"].contains(&level.as_str()));
    }

    /// `check_limits` is false exactly when some reading is outside its range.
    #[test]
    fn check_limits_matches_ranges(values in prop::array::uniform5(-500_i64..200_000)) {
        let mut record = DeviceRecord::defaults(DeviceId::parse("prop").unwrap(), "t0");
        record.telemetry = radio_device_store::store::record::Telemetry::from_values(values);
        let expected = LIMITS.iter().zip(values).all(|(l, v)| l.min <= v && v <= l.max);
        prop_assert_eq!(check_limits(&record), expected);
    }
}
