use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use super::*;
use crate::analysis::AlertSeverity;

fn open_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("graphene.sqlite3")).unwrap();
    (db, dir)
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 3, 17, 43, 14).unwrap() + Duration::seconds(secs)
}

fn data_file(id: &str, subject: &str, uploaded_at: DateTime<Utc>) -> DataFile {
    DataFile {
        id: id.to_string(),
        subject_id: subject.to_string(),
        uploaded_by: Some("clinician-2".to_string()),
        uploaded_at,
        file_path: format!("/tmp/{id}.csv"),
        source_device: None,
        notes: Some("left heel".to_string()),
    }
}

fn frame(id: &str, data_file_id: &str, index: u64, captured_at: DateTime<Utc>, peak: u32) -> PressureFrame {
    PressureFrame {
        id: id.to_string(),
        data_file_id: data_file_id.to_string(),
        frame_index: index,
        captured_at,
        peak_pressure: peak,
        average_pressure: f64::from(peak) / 2.0,
        contact_area_percent: 50.0,
        risk_score: 42.5,
        viewed_at: None,
        alerts_evaluated: false,
    }
}

fn alert(id: &str, subject: &str, frame_id: &str, triggered_at: DateTime<Utc>) -> Alert {
    Alert {
        id: id.to_string(),
        subject_id: subject.to_string(),
        data_file_id: Some("df-1".to_string()),
        frame_id: Some(frame_id.to_string()),
        severity: AlertSeverity::High,
        alert_type: "HighPressure".to_string(),
        status: AlertStatus::Open,
        message: Some("Peak pressure 150 exceeded threshold 120 on frame 0".to_string()),
        peak_pressure: 150,
        triggered_at,
        resolved_by: None,
        resolved_at: None,
    }
}

#[tokio::test]
async fn upload_round_trips() {
    let (db, _dir) = open_db();
    let file = data_file("df-1", "patient-1", at(0));
    let frames = vec![frame("f-0", "df-1", 0, at(0), 90), frame("f-1", "df-1", 1, at(1), 150)];
    let alerts = vec![alert("a-1", "patient-1", "f-1", at(1))];

    db.insert_upload(&file, &frames, &alerts).await.unwrap();

    assert_eq!(db.get_data_file("df-1").await.unwrap(), Some(file.clone()));
    assert_eq!(db.get_frames_for_data_file("df-1").await.unwrap(), frames);
    assert_eq!(db.get_frame("f-1").await.unwrap(), Some(frames[1].clone()));
    assert_eq!(db.get_alerts_for_frame("f-1").await.unwrap(), alerts);
    assert_eq!(
        db.latest_frame_for_data_file("df-1").await.unwrap().map(|f| f.id),
        Some("f-1".to_string())
    );
    assert!(db.get_frame("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_upload_leaves_nothing_behind() {
    let (db, _dir) = open_db();
    let file = data_file("df-1", "patient-1", at(0));
    // Duplicate frame index violates UNIQUE(data_file_id, frame_index).
    let frames = vec![frame("f-0", "df-1", 0, at(0), 1), frame("f-1", "df-1", 0, at(1), 2)];

    assert!(db.insert_upload(&file, &frames, &[]).await.is_err());
    assert!(db.get_data_file("df-1").await.unwrap().is_none());
    assert!(db.get_frame("f-0").await.unwrap().is_none());
}

#[tokio::test]
async fn latest_data_file_wins() {
    let (db, _dir) = open_db();
    db.insert_upload(&data_file("old", "patient-1", at(0)), &[], &[])
        .await
        .unwrap();
    db.insert_upload(&data_file("new", "patient-1", at(3600)), &[], &[])
        .await
        .unwrap();
    db.insert_upload(&data_file("other", "patient-2", at(7200)), &[], &[])
        .await
        .unwrap();

    let latest = db.latest_data_file_for_subject("patient-1").await.unwrap();
    assert_eq!(latest.map(|f| f.id), Some("new".to_string()));

    let listed: Vec<String> = db
        .list_data_files_for_subject("patient-1")
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(listed, vec!["new".to_string(), "old".to_string()]);
}

#[tokio::test]
async fn recent_frames_span_uploads_oldest_first() {
    let (db, _dir) = open_db();
    let first: Vec<PressureFrame> = (0..3)
        .map(|i| frame(&format!("a{i}"), "df-a", i, at(i as i64), 10))
        .collect();
    let second: Vec<PressureFrame> = (0..3)
        .map(|i| frame(&format!("b{i}"), "df-b", i, at(100 + i as i64), 20))
        .collect();
    db.insert_upload(&data_file("df-a", "patient-1", at(0)), &first, &[])
        .await
        .unwrap();
    db.insert_upload(&data_file("df-b", "patient-1", at(100)), &second, &[])
        .await
        .unwrap();

    let ids: Vec<String> = db
        .recent_frames_for_subject("patient-1", 4)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(ids, vec!["a2", "b0", "b1", "b2"]);

    assert!(db
        .recent_frames_for_subject("patient-9", 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn frame_is_marked_viewed_once() {
    let (db, _dir) = open_db();
    db.insert_upload(
        &data_file("df-1", "patient-1", at(0)),
        &[frame("f-0", "df-1", 0, at(0), 1)],
        &[],
    )
    .await
    .unwrap();

    assert!(db.record_frame_view("f-0", at(60), None).await.unwrap().first_view);
    assert!(!db.record_frame_view("f-0", at(120), None).await.unwrap().first_view);

    let stored = db.get_frame("f-0").await.unwrap().unwrap();
    assert_eq!(stored.viewed_at, Some(at(60)));
    assert!(!stored.alerts_evaluated);
}

#[tokio::test]
async fn view_alerts_are_stored_once_per_frame() {
    let (db, _dir) = open_db();
    let evaluated = PressureFrame {
        alerts_evaluated: true,
        ..frame("f-1", "df-1", 1, at(1), 150)
    };
    db.insert_upload(
        &data_file("df-1", "patient-1", at(0)),
        &[frame("f-0", "df-1", 0, at(0), 150), evaluated],
        &[],
    )
    .await
    .unwrap();

    let view = db
        .record_frame_view("f-0", at(60), Some(vec![alert("a-1", "patient-1", "f-0", at(0))]))
        .await
        .unwrap();
    assert!(view.first_view);
    assert_eq!(view.alerts.len(), 1);
    assert!(db.get_frame("f-0").await.unwrap().unwrap().alerts_evaluated);

    let again = db
        .record_frame_view("f-0", at(90), Some(vec![alert("a-2", "patient-1", "f-0", at(0))]))
        .await
        .unwrap();
    assert!(again.alerts.is_empty());

    // Decided at upload: a view never adds to it.
    let uploaded = db
        .record_frame_view("f-1", at(60), Some(vec![alert("a-3", "patient-1", "f-1", at(1))]))
        .await
        .unwrap();
    assert!(uploaded.first_view);
    assert!(uploaded.alerts.is_empty());

    assert_eq!(db.count_alerts(Some("patient-1")).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_view_leaves_frame_unviewed() {
    let (db, _dir) = open_db();
    db.insert_upload(
        &data_file("df-1", "patient-1", at(0)),
        &[frame("f-0", "df-1", 0, at(0), 150)],
        &[],
    )
    .await
    .unwrap();
    db.execute(|conn| {
        conn.execute_batch("DROP TABLE alerts")?;
        Ok(())
    })
    .await
    .unwrap();

    let result = db
        .record_frame_view("f-0", at(60), Some(vec![alert("a-1", "patient-1", "f-0", at(0))]))
        .await;
    assert!(result.is_err());

    let stored = db.get_frame("f-0").await.unwrap().unwrap();
    assert_eq!(stored.viewed_at, None);
    assert!(!stored.alerts_evaluated);
}

#[tokio::test]
async fn alert_lifecycle() {
    let (db, _dir) = open_db();
    db.insert_upload(
        &data_file("df-1", "patient-1", at(0)),
        &[frame("f-0", "df-1", 0, at(0), 150), frame("f-1", "df-1", 1, at(1), 160)],
        &[],
    )
    .await
    .unwrap();
    db.insert_alerts(&[
        alert("a-1", "patient-1", "f-0", at(0)),
        alert("a-2", "patient-1", "f-1", at(1)),
    ])
    .await
    .unwrap();

    let listed: Vec<String> = db
        .list_alerts_for_subject("patient-1")
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(listed, vec!["a-2", "a-1"]);
    assert_eq!(db.count_open_alerts(Some("patient-1")).await.unwrap(), 2);
    assert_eq!(db.count_alerts(Some("patient-1")).await.unwrap(), 2);
    assert_eq!(db.count_alerts(Some("patient-9")).await.unwrap(), 0);

    db.acknowledge_alert("a-1").await.unwrap();
    assert_eq!(
        db.get_alert("a-1").await.unwrap().map(|a| a.status),
        Some(AlertStatus::Acknowledged)
    );
    assert_eq!(db.count_open_alerts(None).await.unwrap(), 2);

    db.resolve_alert("a-1", "clinician-2", at(300)).await.unwrap();
    let resolved = db.get_alert("a-1").await.unwrap().unwrap();
    assert_eq!(resolved.status, AlertStatus::Resolved);
    assert_eq!(resolved.resolved_by.as_deref(), Some("clinician-2"));
    assert_eq!(resolved.resolved_at, Some(at(300)));
    assert_eq!(db.count_open_alerts(Some("patient-1")).await.unwrap(), 1);

    assert!(db.acknowledge_alert("a-1").await.is_err());
    assert!(db.resolve_alert("a-1", "clinician-2", at(400)).await.is_err());
    assert!(db.resolve_alert("nope", "clinician-2", at(400)).await.is_err());
    assert_eq!(db.list_alerts().await.unwrap().len(), 2);
    assert_eq!(db.count_alerts(None).await.unwrap(), 2);
}
