mod common;

use chrono::{NaiveDate, NaiveTime};
use common::{col, fixed_now, later_now, sample_store, sample_table};
use lab_processes::error::ProcessError;
use lab_processes::resolver::{ResolvedRow, RowIdentifier};
use lab_processes::store::{MemoryStore, TabularStore};
use lab_processes::table::{Table, columns};
use lab_processes::update::{
    FieldChange, FieldUpdate, RejectedField, apply_update, derive_fields, plan_update,
    transform_fields, transforms,
};
use lab_processes::value::SheetValue;

fn row_cells(store: &mut MemoryStore, index: usize) -> Vec<String> {
    store.read_all().unwrap().rows[index].clone()
}

#[test]
fn unknown_fields_are_dropped_individually() {
    let mut store = sample_store();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(1))
        .set(columns::NOTAS, "revisar mordida")
        .set("Color_favorito", "azul");

    let outcome = apply_update(&mut store, &update, fixed_now()).unwrap();

    assert_eq!(outcome.row_number, 3);
    assert_eq!(outcome.written, vec![columns::NOTAS.to_string()]);
    assert_eq!(outcome.dropped, vec!["Color_favorito".to_string()]);
    assert_eq!(outcome.timestamp.as_deref(), Some("2024-03-07 10:30:00"));
    assert_eq!(store.cell(3, col(columns::NOTAS)), "revisar mordida");
    assert_eq!(store.cell(3, col(columns::ULTIMA_MODIFICACION)), "2024-03-07 10:30:00");
    assert_eq!(store.mutation_count(), 2);
}

#[test]
fn only_unknown_fields_is_rejected_without_writing() {
    let mut store = sample_store();
    let before = store.read_all().unwrap();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(0))
        .set("Color_favorito", "azul")
        .set("Mascota", "gato");

    let err = apply_update(&mut store, &update, fixed_now()).unwrap_err();

    match err {
        ProcessError::UnknownFields { fields } => {
            assert_eq!(fields, vec!["Color_favorito".to_string(), "Mascota".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(store.mutation_count(), 0);
    assert_eq!(store.read_all().unwrap(), before);
}

#[test]
fn missing_row_is_not_found() {
    let mut store = sample_store();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(10)).set(columns::NOTAS, "x");
    assert!(matches!(
        apply_update(&mut store, &update, fixed_now()),
        Err(ProcessError::NotFound)
    ));

    let update = FieldUpdate::new(RowIdentifier::by_order_number("Z-9")).set(columns::NOTAS, "x");
    assert!(matches!(
        apply_update(&mut store, &update, fixed_now()),
        Err(ProcessError::NotFound)
    ));
    assert_eq!(store.mutation_count(), 0);
}

#[test]
fn order_number_updates_first_duplicate() {
    let mut store = sample_store();
    let update = FieldUpdate::new(RowIdentifier::by_order_number("A-1"))
        .set(columns::COMENTARIOS, "listo");
    let outcome = apply_update(&mut store, &update, fixed_now()).unwrap();
    assert_eq!(outcome.row_number, 2);
    assert_eq!(store.cell(2, col(columns::COMENTARIOS)), "listo");
    assert_eq!(store.cell(4, col(columns::COMENTARIOS)), "");
}

#[test]
fn same_update_twice_gives_same_cells() {
    let mut store = sample_store();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(2))
        .set(columns::STATUS, "3_retenedor")
        .set(columns::DIAS_ENTREGA, 4.0)
        .set(columns::FECHA_INICIO_SUD, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());

    apply_update(&mut store, &update, fixed_now()).unwrap();
    let first = row_cells(&mut store, 2);
    apply_update(&mut store, &update, later_now()).unwrap();
    let second = row_cells(&mut store, 2);

    let stamp = col(columns::ULTIMA_MODIFICACION) - 1;
    for (i, (a, b)) in first.iter().zip(second.iter()).enumerate() {
        if i != stamp {
            assert_eq!(a, b, "column {} changed between identical updates", i + 1);
        }
    }
    assert_eq!(first[stamp], "2024-03-07 10:30:00");
    assert_eq!(second[stamp], "2024-03-08 08:00:00");
    assert_eq!(first[col(columns::DIAS_ENTREGA) - 1], "4");
}

#[test]
fn dates_and_times_are_written_in_sheet_format() {
    let mut store = sample_store();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(0))
        .set(columns::FECHA_INICIO_SUD, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap())
        .set(columns::HORA_INICIO_SUD, NaiveTime::from_hms_opt(9, 5, 0).unwrap())
        .set(columns::RESPONSABLE_SUD, SheetValue::Null);
    apply_update(&mut store, &update, fixed_now()).unwrap();

    assert_eq!(store.cell(2, col(columns::FECHA_INICIO_SUD)), "2024-03-07");
    assert_eq!(store.cell(2, col(columns::HORA_INICIO_SUD)), "09:05");
    assert_eq!(store.cell(2, col(columns::RESPONSABLE_SUD)), "");
}

#[test]
fn aligner_count_recomputes_total() {
    let mut store = sample_store();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(0))
        .set(columns::NO_ALINEADORES_SUPERIOR, 10i64);
    let outcome = apply_update(&mut store, &update, fixed_now()).unwrap();

    assert!(outcome.written.contains(&columns::TOTAL_ALINEADORES.to_string()));
    assert_eq!(store.cell(2, col(columns::NO_ALINEADORES_SUPERIOR)), "10");
    assert_eq!(store.cell(2, col(columns::TOTAL_ALINEADORES)), "17");
}

#[test]
fn unparseable_count_counts_as_zero_in_total() {
    let mut store = sample_store();
    store
        .write_cell(4, col(columns::NO_ALINEADORES_INFERIOR), "3".into())
        .unwrap();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(2))
        .set(columns::NO_ALINEADORES_SUPERIOR, "abc");
    apply_update(&mut store, &update, fixed_now()).unwrap();

    assert_eq!(store.cell(4, col(columns::NO_ALINEADORES_SUPERIOR)), "abc");
    assert_eq!(store.cell(4, col(columns::TOTAL_ALINEADORES)), "3");
}

#[test]
fn derive_keeps_a_caller_supplied_total() {
    let table = sample_table();
    let mut fields = FieldUpdate::default()
        .set(columns::NO_ALINEADORES_INFERIOR, 1i64)
        .set(columns::TOTAL_ALINEADORES, 99i64)
        .fields;
    derive_fields(&table, 0, &mut fields);
    assert_eq!(fields[columns::TOTAL_ALINEADORES], SheetValue::Int(99));

    let mut fields = FieldUpdate::default().set(columns::NOTAS, "x").fields;
    derive_fields(&table, 0, &mut fields);
    assert!(!fields.contains_key(columns::TOTAL_ALINEADORES));
}

#[test]
fn range_covers_only_the_touched_span() {
    let table = sample_table();
    let fields = FieldUpdate::default()
        .set(columns::STATUS, "3_retenedor")
        .set(columns::NOTAS, "nueva nota")
        .fields;
    let plan = plan_update(&table, ResolvedRow { index: 0 }, &fields).unwrap();

    let range = plan.range.unwrap();
    assert_eq!(range.col_start, col(columns::STATUS));
    assert_eq!(range.col_end, col(columns::NOTAS));
    assert_eq!(range.values.len(), range.col_end - range.col_start + 1);
    assert_eq!(range.values[0], "3_retenedor");
    assert_eq!(range.values.last().map(|s| s.as_str()), Some("nueva nota"));
    // untouched columns inside the span keep what was read
    assert_eq!(
        range.values[col(columns::TIPO_ALINEADOR) - range.col_start],
        table.get(0, columns::TIPO_ALINEADOR)
    );
    assert_eq!(plan.timestamp_col, Some(col(columns::ULTIMA_MODIFICACION)));
    assert_eq!(plan.row_number, 2);
}

#[test]
fn columns_outside_the_span_are_untouched() {
    let mut store = sample_store();
    let before = row_cells(&mut store, 0);
    let update = FieldUpdate::new(RowIdentifier::by_row_index(0)).set(columns::NOTAS, "n");
    apply_update(&mut store, &update, fixed_now()).unwrap();
    let after = row_cells(&mut store, 0);

    for (i, (a, b)) in before.iter().zip(after.iter()).enumerate() {
        let column = i + 1;
        if column == col(columns::NOTAS) || column == col(columns::ULTIMA_MODIFICACION) {
            continue;
        }
        assert_eq!(a, b, "column {} should not change", column);
    }
}

#[test]
fn timestamp_only_update_writes_one_cell() {
    let mut store = sample_store();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(3))
        .set(columns::ULTIMA_MODIFICACION, "ignored");
    let outcome = apply_update(&mut store, &update, fixed_now()).unwrap();
    assert_eq!(store.mutation_count(), 1);
    assert_eq!(store.cell(5, col(columns::ULTIMA_MODIFICACION)), "2024-03-07 10:30:00");
    assert_eq!(outcome.timestamp.as_deref(), Some("2024-03-07 10:30:00"));
}

#[test]
fn worksheet_without_timestamp_column_skips_the_stamp() {
    let headers = vec![columns::NO_ORDEN.to_string(), columns::NOTAS.to_string()];
    let table = Table::with_rows(headers, vec![vec!["A-1".into(), "".into()]]);
    let mut store = MemoryStore::from_table(&table);

    let update = FieldUpdate::new(RowIdentifier::by_order_number("A-1")).set(columns::NOTAS, "ok");
    let outcome = apply_update(&mut store, &update, fixed_now()).unwrap();

    assert_eq!(outcome.timestamp, None);
    assert_eq!(store.mutation_count(), 1);
    assert_eq!(store.cell(2, 2), "ok");
}

#[test]
fn field_change_runs_transform_first() {
    let mut store = sample_store();
    let update = FieldChange::new(RowIdentifier::by_row_index(1), columns::NO_ORDEN, "  B-7  ")
        .transform(transforms::trim)
        .into_update()
        .unwrap();
    apply_update(&mut store, &update, fixed_now()).unwrap();
    assert_eq!(store.cell(3, col(columns::NO_ORDEN)), "B-7");
}

#[test]
fn failed_transform_writes_nothing() {
    let change = FieldChange::new(RowIdentifier::by_row_index(0), columns::DIAS_ENTREGA, "pronto")
        .transform(transforms::count);
    match change.into_update() {
        Err(ProcessError::Transform { field, .. }) => assert_eq!(field, columns::DIAS_ENTREGA),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("transform should fail"),
    }
}

#[test]
fn failed_derivation_is_reported() {
    let change = FieldChange::new(RowIdentifier::by_row_index(0), columns::IPR, "Sí")
        .derive(|_| Err("no rule".to_string()));
    assert!(matches!(
        change.into_update(),
        Err(ProcessError::DerivedField { .. })
    ));
}

#[test]
fn derived_values_join_the_same_update() {
    let update = FieldChange::new(RowIdentifier::by_row_index(0), columns::NO_ALINEADORES_SUPERIOR, 5i64)
        .transform(transforms::count)
        .derive(|value| {
            Ok(vec![(
                columns::TOTAL_ALINEADORES.to_string(),
                SheetValue::Int(value.as_count() + 7),
            )])
        })
        .into_update()
        .unwrap();
    assert_eq!(update.fields[columns::NO_ALINEADORES_SUPERIOR], SheetValue::Int(5));
    assert_eq!(update.fields[columns::TOTAL_ALINEADORES], SheetValue::Int(12));
}

#[test]
fn form_transforms() {
    assert_eq!(transforms::count(SheetValue::Null).unwrap(), SheetValue::Int(0));
    assert_eq!(transforms::count(SheetValue::Float(3.0)).unwrap(), SheetValue::Int(3));
    assert_eq!(transforms::count(" 8 ".into()).unwrap(), SheetValue::Int(8));
    assert_eq!(
        transforms::responsible("Selecciona".into()).unwrap(),
        SheetValue::Text(String::new())
    );
    assert_eq!(
        transforms::responsible("Karen".into()).unwrap(),
        SheetValue::Text("Karen".into())
    );
    assert_eq!(transforms::ipr("si".into()).unwrap(), SheetValue::from("Sí"));
    assert_eq!(transforms::ipr(SheetValue::Null).unwrap(), SheetValue::from("No"));
    assert_eq!(
        transforms::date("2024-03-07".into()).unwrap(),
        SheetValue::Date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap())
    );
    assert!(transforms::date("7 de marzo".into()).is_err());
    assert_eq!(
        transforms::time("09:05".into()).unwrap().to_sheet_string(),
        "09:05"
    );
}

#[test]
fn total_sums_request_and_stored_counts() {
    let mut store = sample_store();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(0))
        .set(columns::NO_ALINEADORES_SUPERIOR, 5i64);
    apply_update(&mut store, &update, fixed_now()).unwrap();

    assert_eq!(store.cell(2, col(columns::NO_ALINEADORES_INFERIOR)), "7");
    assert_eq!(store.cell(2, col(columns::TOTAL_ALINEADORES)), "12");
}

#[test]
fn huge_counts_saturate_the_total() {
    let mut store = sample_store();
    let update = FieldUpdate::new(RowIdentifier::by_row_index(0))
        .set(columns::NO_ALINEADORES_SUPERIOR, i64::MAX);
    apply_update(&mut store, &update, fixed_now()).unwrap();

    assert_eq!(
        store.cell(2, col(columns::TOTAL_ALINEADORES)),
        i64::MAX.to_string()
    );

    // the store is still usable afterwards
    let update = FieldUpdate::new(RowIdentifier::by_row_index(0))
        .set(columns::NO_ALINEADORES_SUPERIOR, 1i64);
    apply_update(&mut store, &update, fixed_now()).unwrap();
    assert_eq!(store.cell(2, col(columns::TOTAL_ALINEADORES)), "8");
}

#[test]
fn column_transforms_reject_bad_values_one_by_one() {
    let update = FieldUpdate::new(RowIdentifier::by_row_index(0))
        .set(columns::DIAS_ENTREGA, "pronto")
        .set(columns::FECHA_INICIO_SUD, "2024-03-07")
        .set(columns::NO_ORDEN, "  B-7 ")
        .set(columns::NOTAS, "  tal cual ");

    let (checked, rejected) = transform_fields(&update);

    assert_eq!(rejected.len(), 1);
    let RejectedField { field, message } = &rejected[0];
    assert_eq!(field, columns::DIAS_ENTREGA);
    assert!(message.contains("pronto"));

    assert!(!checked.fields.contains_key(columns::DIAS_ENTREGA));
    assert_eq!(
        checked.fields[columns::FECHA_INICIO_SUD],
        SheetValue::Date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap())
    );
    assert_eq!(checked.fields[columns::NO_ORDEN], SheetValue::from("B-7"));
    assert_eq!(checked.fields[columns::NOTAS], SheetValue::from("  tal cual "));
    assert_eq!(checked.identifier, update.identifier);
}

#[test]
fn columns_map_to_form_transforms() {
    assert!(transforms::for_column(columns::HORA_INICIO_SUD).is_some());
    assert!(transforms::for_column(columns::IPR).is_some());
    assert!(transforms::for_column(columns::PLANTILLA_INFERIOR).is_some());
    assert!(transforms::for_column(columns::STATUS).is_none());
    assert!(transforms::for_column("Color_favorito").is_none());

    let count = transforms::for_column(columns::NO_ALINEADORES_INFERIOR).unwrap();
    assert_eq!(count("4".into()).unwrap(), SheetValue::Int(4));
    let date = transforms::for_column(columns::FECHA_SOLICITUD_ENVIO).unwrap();
    assert_eq!(date("".into()).unwrap(), SheetValue::Null);
}

#[test]
fn json_fields_become_sheet_values() {
    let fields: std::collections::BTreeMap<String, serde_json::Value> = serde_json::from_str(
        r#"{"Dias_entrega": 3, "Notas": "ok", "Responsable_SUD": null}"#,
    )
    .unwrap();
    let update = FieldUpdate::from_json_fields(RowIdentifier::by_order_number("A-1"), &fields);
    assert_eq!(update.fields[columns::DIAS_ENTREGA], SheetValue::Int(3));
    assert_eq!(update.fields[columns::NOTAS], SheetValue::from("ok"));
    assert_eq!(update.fields[columns::RESPONSABLE_SUD], SheetValue::Null);
}
