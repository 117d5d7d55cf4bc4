// src/normalize_tests.rs

#[cfg(test)]
mod tests {
    use crate::model::*;
    use crate::normalize::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    // --- Shape normalization ---

    #[test]
    fn test_array_is_returned_unchanged() {
        let canonical = json!([{"id": 1}, {"id": 2}]);
        let once = to_record_array(&canonical);
        assert_eq!(once, canonical.as_array().unwrap().clone());
        assert_eq!(to_record_array(&serde_json::Value::Array(once.clone())), once);
    }

    #[test]
    fn test_wrapper_keys() {
        assert_eq!(to_record_array(&json!({"items": [1, 2]})), vec![json!(1), json!(2)]);
        assert_eq!(to_record_array(&json!({"data": [3]})), vec![json!(3)]);
        assert_eq!(to_record_array(&json!({"results": [4]})), vec![json!(4)]);
    }

    #[test]
    fn test_wrapper_priority() {
        let payload = json!({"results": [3], "data": [2], "items": [1]});
        assert_eq!(to_record_array(&payload), vec![json!(1)]);
        // Non-array `items` is skipped.
        let payload = json!({"items": {"a": 1}, "data": [2]});
        assert_eq!(to_record_array(&payload), vec![json!(2)]);
    }

    #[test]
    fn test_first_array_property_in_order() {
        let payload = json!({"count": 2, "logs": [{"ts": "a"}], "other": [1]});
        assert_eq!(to_record_array(&payload), vec![json!({"ts": "a"})]);
    }

    #[test]
    fn test_unknown_shapes_degrade_to_empty() {
        assert!(to_record_array(&json!({})).is_empty());
        assert!(to_record_array(&json!({"count": 0})).is_empty());
        assert!(to_record_array(&json!("text")).is_empty());
        assert!(to_record_array(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn test_days_map_sorted_ascending() {
        let map = json!({"2024-03-02": 8, "2024-03-01": 7.5});
        let rows = days_map_to_rows(map.as_object().unwrap());
        assert_eq!(
            rows,
            vec![
                DayRow::with_hours("2024-03-01", dec!(7.5)),
                DayRow::with_hours("2024-03-02", dec!(8)),
            ]
        );
    }

    #[test]
    fn test_days_map_non_numeric_is_zero() {
        let map = json!({"2024-03-01": null, "2024-03-02": "6.25", "2024-03-03": "n/a"});
        let rows = days_map_to_rows(map.as_object().unwrap());
        let hours: Vec<_> = rows.iter().map(|r| r.hours).collect();
        assert_eq!(hours, vec![dec!(0), dec!(6.25), dec!(0)]);
    }

    #[test]
    fn test_days_map_object_values() {
        let map = json!({"2024-03-01": {"hours": 8, "food": 2000, "late": 500}});
        let rows = days_map_to_rows(map.as_object().unwrap());
        assert_eq!(rows[0].day, "2024-03-01");
        assert_eq!(rows[0].food_allowance, dec!(2000));
        assert_eq!(rows[0].late_penalty, dec!(500));
    }

    // --- Field access ---

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(decimal_of(&json!(160)), Some(dec!(160)));
        assert_eq!(decimal_of(&json!(7.25)), Some(dec!(7.25)));
        assert_eq!(decimal_of(&json!(" 12.5 ")), Some(dec!(12.5)));
        assert_eq!(decimal_of(&json!("1e3")), Some(dec!(1000)));
        assert_eq!(decimal_of(&json!("")), None);
        assert_eq!(decimal_of(&json!(true)), None);
        assert_eq!(decimal_of(&json!(null)), None);
    }

    #[test]
    fn test_dotted_lookup() {
        let record = json!({"totals": {"hours": 160}});
        assert_eq!(first_decimal(&record, &["hours", "totals.hours"]), Some(dec!(160)));
        assert_eq!(lookup(&record, "totals.missing"), None);
        assert_eq!(lookup(&record, "totals.hours.deeper"), None);
    }

    #[test]
    fn test_decimal_json_keeps_integers() {
        assert_eq!(decimal_json(dec!(3000)), json!(3000));
        assert_eq!(decimal_json(dec!(3000.00)), json!(3000));
        assert_eq!(decimal_json(dec!(2.5)), json!(2.5));
    }

    #[test]
    fn test_record_id_from_wrappers() {
        assert_eq!(extract_record_id(&json!({"id": 17})).as_deref(), Some("17"));
        assert_eq!(
            extract_record_id(&json!({"override": {"id": "ov-3"}})).as_deref(),
            Some("ov-3")
        );
        assert_eq!(extract_record_id(&json!({"data": {"id": 4}})).as_deref(), Some("4"));
        assert_eq!(extract_record_id(&json!({"ok": true})), None);
    }

    // --- Record decoders ---

    #[test]
    fn test_day_row_canonical_key_wins() {
        let row = decode_day_row(&json!({
            "date": "2024-03-04",
            "hours": 8,
            "food_allowance": 3000,
            "food": 1,
            "other": 250,
            "deduct": 100,
            "late": 400,
            "late_penalty": 500
        }))
        .unwrap();
        assert_eq!(row.day, "2024-03-04");
        assert_eq!(row.food_allowance, dec!(3000));
        assert_eq!(row.other_allowance, dec!(250));
        assert_eq!(row.deductions, dec!(100));
        assert_eq!(row.late_penalty, dec!(500));
        assert_eq!(row.advance, None);
    }

    #[test]
    fn test_day_row_hours_from_duration() {
        let row = decode_day_row(&json!({"day": "Mon", "duration_minutes": 450})).unwrap();
        assert_eq!(row.hours, dec!(7.5));
        assert!(decode_day_row(&json!({"hours": 8})).is_none());
    }

    #[test]
    fn test_log_entry_aliases_and_derived_hours() {
        let entry = decode_log_entry(&json!({
            "ts": "2024-03-05T08:10:00",
            "check_in": "2024-03-05T08:10:00",
            "clock_out": "2024-03-05T16:40:00",
            "device_name": "Gate 2",
            "is_late": 1,
            "minutes_late": 10
        }));
        assert_eq!(entry.timestamp.as_deref(), Some("2024-03-05T08:10:00"));
        assert_eq!(entry.device.as_deref(), Some("Gate 2"));
        assert_eq!(entry.hours, Some(dec!(8.5)));
        assert!(entry.late);
        assert_eq!(entry.late_minutes, Some(dec!(10)));
        assert_eq!(entry.day(), Some("2024-03-05"));
    }

    #[test]
    fn test_log_entry_explicit_hours_and_overnight() {
        let entry = decode_log_entry(&json!({"in": "22:00", "out": "06:00", "hours": 7}));
        assert_eq!(entry.hours, Some(dec!(7)));

        let entry = decode_log_entry(&json!({"in": "22:00", "out": "06:00"}));
        assert_eq!(entry.hours, Some(dec!(8)));

        let entry = decode_log_entry(&json!({"timestamp": "2024-03-05T08:00:00"}));
        assert_eq!(entry.hours, None);
        assert!(!entry.late);
    }

    #[test]
    fn test_hours_between_rounding() {
        assert_eq!(hours_between("08:00", "15:20"), Some(dec!(7.33)));
        assert_eq!(
            hours_between("2024-03-05T08:00:00+03:00", "2024-03-05T12:30:00+03:00"),
            Some(dec!(4.5))
        );
        assert_eq!(hours_between("08:00", "08:00"), None);
        assert_eq!(hours_between("soon", "later"), None);
    }

    #[test]
    fn test_employee_unwrapped_and_uppercased() {
        let employee = decode_employee(&json!({
            "employee": {"id": "42", "uid": " e-42 ", "branch": {"name": "Erbil"}, "name": "A. Karim"}
        }))
        .unwrap();
        assert_eq!(employee.id, 42);
        assert_eq!(employee.uid.as_deref(), Some("E-42"));
        assert_eq!(employee.branch.as_deref(), Some("Erbil"));
        assert!(decode_employee(&json!({"detail": "nope"})).is_none());
    }

    #[test]
    fn test_adjustment_reason_read_as_note() {
        let list = decode_adjustments(
            &json!({"items": [
                {"id": 5, "date": "2024-03-02", "amount": "-2500", "reason": "broken cup"},
                {"id": 6, "month": "2024-03", "amount_iqd": 10000, "note": "uniform", "created_by": {"name": "hr"}}
            ]}),
            AdjustmentKind::Deduction,
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id.as_deref(), Some("5"));
        assert_eq!(list[0].amount, dec!(-2500));
        assert_eq!(list[0].note.as_deref(), Some("broken cup"));
        assert_eq!(list[1].amount, dec!(10000));
        assert_eq!(list[1].created_by.as_deref(), Some("hr"));
        assert_eq!(list[1].kind, AdjustmentKind::Deduction);
    }
}
