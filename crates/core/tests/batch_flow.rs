//! End-to-end flow: an intake request seeds a work record, the batch
//! run turns it into artifacts and a deploy script, and the record is
//! retired so a re-scan finds nothing left to do.

use signalforge_core::intake::{self, IntakeConfig};
use signalforge_core::pipeline::{self, BatchConfig};
use signalforge_core::store::memory::{
    MemoryObjectStore, MemoryRecordStore, RecordingTrigger,
};
use signalforge_test_model::{PresetReply, ScriptedProvider};

fn artifact_reply(body: &str) -> PresetReply {
    PresetReply::with_text(format!("```python\n{body}\n```"))
}

#[tokio::test]
async fn test_intake_then_batch_then_rescan() {
    let provider = ScriptedProvider::default();
    provider.add_reply(PresetReply::with_text(
        "Here you go:\n```\n1. Laser Cutter\n2. CNC Press #2\n```",
    ));
    provider.add_reply(artifact_reply("generate_laser_cutter_data()"));
    provider.add_reply(artifact_reply("generate_cnc_press_data()"));

    let records = MemoryRecordStore::new();
    let objects = MemoryObjectStore::new();
    let trigger = RecordingTrigger::new();

    // Intake: ask for the item list and seed the ready record.
    let config = IntakeConfig::new(2, "manufacturing", "artifact-batch");
    let items = intake::request_items(
        provider.clone(),
        "alice",
        &config,
        &records,
        &trigger,
    )
    .await
    .unwrap();
    assert_eq!(items, vec!["Laser Cutter", "CNC Press #2"]);
    assert_eq!(trigger.started(), vec!["artifact-batch"]);

    // Batch: the triggered pipeline picks the ready record up.
    let record = pipeline::find_ready(&records).await.unwrap().unwrap();
    assert_eq!(record.owner_id, "alice");
    assert_eq!(record.items, items);

    let workdir = tempfile::tempdir().unwrap();
    let batch = BatchConfig::new(workdir.path(), "s3://sink");
    let outcomes =
        pipeline::run_batch(provider.clone(), &record, &batch, &objects, &records)
            .await
            .unwrap();
    assert!(outcomes.iter().all(|o| o.is_ok()));
    assert_eq!(outcomes[0].slug, "laser-cutter");
    assert_eq!(outcomes[1].slug, "cnc-press");

    assert_eq!(
        objects.keys(),
        vec![
            "alice/cnc-press/main.py".to_owned(),
            "alice/laser-cutter/main.py".to_owned(),
        ]
    );
    assert!(workdir.path().join("laser-cutter/main.py").exists());
    let script =
        std::fs::read_to_string(workdir.path().join("deploy.sh")).unwrap();
    assert!(script.starts_with("#!/bin/bash"));
    assert!(script.contains("run_artifact \"laser-cutter\" \"s3://sink/alice/laser-cutter/\""));
    assert!(script.contains("run_artifact \"cnc-press\" \"s3://sink/alice/cnc-press/\""));

    // The intake prompt and both code prompts went to the provider, in
    // order, and the code calls carried the accumulated dialogue.
    let requests = provider.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].messages.len(), 1);
    assert_eq!(requests[2].messages.len(), 3);

    // The record was retired; a re-scan has nothing ready.
    assert!(pipeline::find_ready(&records).await.unwrap().is_none());
}
