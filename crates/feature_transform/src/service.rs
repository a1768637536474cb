//! Build, invoke and reconcile for on-demand feature views.

use std::collections::BTreeMap;

use futures_util::future::try_join_all;

use crate::coerce::RepeatedValueColumn;
use crate::error::Result;
use crate::invoker::TransformationInvoker;
use crate::model::OnDemandFeatureView;
use crate::reconcile::extract_transformation_response;
use crate::record::build_input_record;
use crate::vector::FeatureVector;

/// Inputs for one on-demand view within a request.
#[derive(Clone, Debug)]
pub struct TransformationJob {
    pub view: OnDemandFeatureView,
    pub request_data: BTreeMap<String, RepeatedValueColumn>,
    pub entity_rows: BTreeMap<String, RepeatedValueColumn>,
    pub features: Vec<FeatureVector>,
    pub num_rows: usize,
    pub full_feature_names: bool,
}

#[derive(Clone)]
pub struct OnDemandTransformer {
    invoker: TransformationInvoker,
}

impl OnDemandTransformer {
    pub fn new(invoker: TransformationInvoker) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &TransformationInvoker {
        &self.invoker
    }

    /// Compute the feature vectors of `view` for `num_rows` rows.
    pub async fn get_transformation(
        &self,
        view: &OnDemandFeatureView,
        request_data: &BTreeMap<String, RepeatedValueColumn>,
        entity_rows: &BTreeMap<String, RepeatedValueColumn>,
        features: &[FeatureVector],
        num_rows: usize,
        full_feature_names: bool,
    ) -> Result<Vec<FeatureVector>> {
        let record = build_input_record(features, request_data, entity_rows, num_rows)?;
        let payload = self.invoker.invoke(&view.name, &record).await?;
        let vectors = extract_transformation_response(view, payload, num_rows, full_feature_names)?;
        tracing::debug!(
            view = %view.name,
            rows = num_rows,
            vectors = vectors.len(),
            "reconciled transformation output"
        );
        Ok(vectors)
    }

    /// Run several views concurrently. Results follow `jobs` order; the first
    /// failure fails the whole call.
    pub async fn get_transformations(
        &self,
        jobs: &[TransformationJob],
    ) -> Result<Vec<Vec<FeatureVector>>> {
        try_join_all(jobs.iter().map(|job| {
            self.get_transformation(
                &job.view,
                &job.request_data,
                &job.entity_rows,
                &job.features,
                job.num_rows,
                job.full_feature_names,
            )
        }))
        .await
    }
}
