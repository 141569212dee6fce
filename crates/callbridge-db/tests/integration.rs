use callbridge_db::{
    add_closing, add_question, create_call, create_pool, create_scenario, get_call,
    load_scenario_script, mark_bridge_executed, mark_sms_sent, run_migrations,
    set_scenario_active, DbRuntimeSettings, NewCall, NewScenario,
};
use callbridge_types::{CallDirection, ConversationMode};

fn file_pool() -> (tempfile::NamedTempFile, callbridge_db::DbPool) {
    let db_file = tempfile::NamedTempFile::new().expect("failed to create temp db file");
    let pool = create_pool(
        db_file.path().to_str().expect("temp path is utf-8"),
        DbRuntimeSettings::default(),
    )
    .expect("failed to create pool");
    (db_file, pool)
}

#[test]
fn migrations_then_full_call_lifecycle() {
    let (_db_file, pool) = file_pool();
    let conn = pool.get().expect("failed to get connection");
    run_migrations(&conn).expect("failed to run migrations");

    let scenario_id = create_scenario(
        &conn,
        &NewScenario {
            name: "appointment",
            greeting: "This is the clinic.",
            disclaimer: "This call is recorded.",
            guidance: "I have two questions.",
            mode: ConversationMode::Strict,
            silence_short_secs: 15,
            silence_long_secs: 60,
            bridge_number: Some("+81355550000"),
            sms_template: Some("Details: {reason}"),
        },
    )
    .expect("scenario");
    add_question(&conn, scenario_id, "When can you come?", 1, true).expect("q1");
    add_question(&conn, scenario_id, "Any allergies?", 2, true).expect("q2");
    add_closing(&conn, scenario_id, "Thank you for your time.", 1).expect("closing");

    create_call(
        &conn,
        &NewCall {
            call_sid: "CAlifecycle",
            scenario_id: Some(scenario_id),
            from_number: "+81500000000",
            to_number: "+81312345678",
            direction: CallDirection::Outbound,
        },
    )
    .expect("call");

    // A different pooled connection sees the committed rows.
    let other = pool.get().expect("second connection");
    let call = get_call(&other, "CAlifecycle").expect("query").expect("exists");
    assert_eq!(call.caller_number(), "+81312345678");

    let script = load_scenario_script(&other, scenario_id)
        .expect("load")
        .expect("exists");
    assert_eq!(script.first_question(), Some("When can you come?"));
    assert_eq!(script.handoff_destination(), Some("+81355550000"));

    assert!(mark_sms_sent(&other, "CAlifecycle").expect("sms"));
    assert!(mark_bridge_executed(&conn, "CAlifecycle").expect("bridge"));
    assert!(!mark_bridge_executed(&other, "CAlifecycle").expect("bridge again"));

    let call = get_call(&conn, "CAlifecycle").expect("query").expect("exists");
    assert!(call.bridge_executed);
    assert!(call.sms_sent);

    set_scenario_active(&conn, scenario_id, false).expect("deactivate");
    let script = load_scenario_script(&conn, scenario_id)
        .expect("load")
        .expect("exists");
    assert!(!script.active);
}

#[test]
fn migrations_are_tracked_across_pool_reopen() {
    let (db_file, pool) = file_pool();
    {
        let conn = pool.get().expect("connection");
        assert!(run_migrations(&conn).expect("first run") > 0);
    }
    drop(pool);

    let pool = create_pool(
        db_file.path().to_str().expect("temp path is utf-8"),
        DbRuntimeSettings::default(),
    )
    .expect("reopen pool");
    let conn = pool.get().expect("connection");
    assert_eq!(run_migrations(&conn).expect("second run"), 0);
}
