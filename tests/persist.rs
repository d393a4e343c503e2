//! Saving and loading trained multi-class predictors.

use std::sync::Arc;

use ndarray::array;

use multiclass_reduce::data::{InMemoryView, KeyRange, LabelValue, VBuffer};
use multiclass_reduce::learner::{LinearScorer, LogisticTrainer, PredictionKind, RoleMappedData, SoftmaxTrainer};
use multiclass_reduce::multiclass::{MultiToBinaryPredictor, MultiToBinaryTrainer, ReductionConfig};
use multiclass_reduce::persist::{
    ComponentCatalog, ModelLoadContext, ModelRepository, ModelSaveContext, PersistError,
};
use multiclass_reduce::Error;

fn trained(reclassify: bool) -> MultiToBinaryPredictor {
    let view = InMemoryView::builder()
        .add_dense(
            "Features",
            array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.5], [0.5, 0.0]].view(),
        )
        .add_key_u16("Label", vec![1, 2, 3, 1, 2], KeyRange::new(3))
        .build()
        .unwrap();
    let data = RoleMappedData::new(Arc::new(view), "Features", "Label").unwrap();
    let mut trainer = MultiToBinaryTrainer::new(
        ReductionConfig::default(),
        Arc::new(LogisticTrainer::default()),
    )
    .unwrap();
    if reclassify {
        trainer = trainer.with_reclassification(Arc::new(SoftmaxTrainer::default()));
    }
    trainer.train(&data).unwrap()
}

fn scores(model: &dyn multiclass_reduce::learner::VectorPredictor, x: &[f32]) -> Vec<f32> {
    let mut out = VBuffer::default();
    model.map(&VBuffer::dense(x.to_vec()), &mut out).unwrap();
    out.to_dense()
}

#[test]
fn round_trip_through_bytes() {
    for reclassify in [false, true] {
        let model = trained(reclassify);
        let mut repo = ModelRepository::new();
        ModelSaveContext::save_root(&mut repo, "Model", &model).unwrap();
        assert!(repo.contains("Model/M2B0/model"));
        assert_eq!(repo.contains("Model/Reclassification/model"), reclassify);

        let bytes = repo.to_bytes().unwrap();
        let repo = ModelRepository::from_bytes(&bytes).unwrap();
        let loaded = ComponentCatalog::with_defaults()
            .load_root_vector(&repo, "Model")
            .unwrap();

        assert_eq!(loaded.output_len(), model.output_len());
        assert_eq!(loaded.kind(), PredictionKind::MulticlassClassification);
        for x in [[0.0, 0.0], [1.0, 0.5], [0.2, 0.9]] {
            assert_eq!(scores(loaded.as_ref(), &x), scores(&model, &x));
        }
    }
}

#[test]
fn loaded_predictor_keeps_classes() {
    let model = trained(false);
    let mut repo = ModelRepository::new();
    ModelSaveContext::save_root(&mut repo, "Model", &model).unwrap();

    let mut ctx = ModelLoadContext::open(&repo, "Model").unwrap();
    assert_eq!(ctx.read_string().unwrap(), MultiToBinaryPredictor::LOADER_SIGNATURE);
    let loaded = MultiToBinaryPredictor::load(&mut ctx, &ComponentCatalog::with_defaults()).unwrap();
    assert_eq!(
        loaded.classes(),
        &[LabelValue::U16(1), LabelValue::U16(2), LabelValue::U16(3)]
    );
    assert!(loaded.label_key());
    assert!(loaded.single_column());
}

#[test]
fn float_classes_round_trip() {
    let scorer = LinearScorer::new(array![0.0, 1.0], 0.0, PredictionKind::BinaryClassification);
    let classes = vec![LabelValue::Float(0.0), LabelValue::Float(3.0)];
    let model = MultiToBinaryPredictor::new(Arc::new(scorer), classes, true, false).unwrap();

    let mut repo = ModelRepository::new();
    ModelSaveContext::save_root(&mut repo, "Model", &model).unwrap();
    let mut ctx = ModelLoadContext::open(&repo, "Model").unwrap();
    ctx.read_string().unwrap();
    let loaded = MultiToBinaryPredictor::load(&mut ctx, &ComponentCatalog::with_defaults()).unwrap();
    assert_eq!(loaded.output_len(), 4);
    assert_eq!(scores(&loaded, &[5.0]), vec![0.0, 0.0, 0.0, 3.0]);
}

#[test]
fn wrong_check_byte_is_rejected() {
    let model = trained(false);
    let mut repo = ModelRepository::new();
    ModelSaveContext::save_root(&mut repo, "Model", &model).unwrap();

    let mut stream = repo.remove("Model/model").unwrap();
    if let Some(last) = stream.last_mut() {
        *last = 7;
    }
    repo.insert("Model/model", stream);

    let err = ComponentCatalog::with_defaults()
        .load_root_vector(&repo, "Model")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Persist(PersistError::BadSentinel { found: 7 })
    ));
}

#[test]
fn missing_inner_model_is_rejected() {
    let model = trained(false);
    let mut repo = ModelRepository::new();
    ModelSaveContext::save_root(&mut repo, "Model", &model).unwrap();
    repo.remove("Model/M2B0/model");

    let err = ComponentCatalog::with_defaults()
        .load_root_vector(&repo, "Model")
        .unwrap_err();
    assert!(matches!(err, Error::Persist(PersistError::MissingEntry(_))));
}

#[test]
fn corrupted_file_fails_checksum() {
    let model = trained(false);
    let mut repo = ModelRepository::new();
    ModelSaveContext::save_root(&mut repo, "Model", &model).unwrap();
    let mut bytes = repo.to_bytes().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(matches!(
        ModelRepository::from_bytes(&bytes),
        Err(PersistError::ChecksumMismatch { .. })
    ));
}
