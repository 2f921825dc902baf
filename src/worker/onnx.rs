use ort::{
    ep,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};

use crate::error::{IndexError, IndexResult};

use super::ProviderPolicy;

/// Execution providers to register, in preference order. Hardware providers
/// are only requested on their own platform; asking the runtime for one it
/// cannot load fails session creation outright.
fn selected_providers(policy: &ProviderPolicy) -> Vec<ep::ExecutionProviderDispatch> {
    let mut providers = Vec::with_capacity(3);

    #[cfg(target_vendor = "apple")]
    providers.extend(policy.prefer_coreml.then(|| ep::CoreML::default().build()));

    #[cfg(target_os = "android")]
    providers.extend(policy.prefer_nnapi.then(|| ep::NNAPI::default().build()));

    providers.extend(policy.allow_cpu_fallback.then(|| ep::CPU::default().build()));
    providers
}

/// Build one inference session. Indexing is a background workload on the
/// host, so sessions run single-threaded; an empty provider selection leaves
/// the runtime's own default in place.
pub fn build_session(model_path: &str, policy: &ProviderPolicy) -> IndexResult<Session> {
    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::All)?
        .with_intra_threads(1)?
        .with_inter_threads(1)?;

    let session = match selected_providers(policy) {
        providers if providers.is_empty() => builder.commit_from_file(model_path)?,
        providers => builder
            .with_execution_providers(providers)?
            .commit_from_file(model_path)?,
    };
    Ok(session)
}

/// Feed one f32 tensor through a session and pull the first output back out
/// as (shape, data).
pub fn run_f32(
    session: &mut Session,
    input: Vec<f32>,
    input_shape: Vec<i64>,
) -> IndexResult<(Vec<i64>, Vec<f32>)> {
    let outputs = session.run(ort::inputs![Tensor::<f32>::from_array((
        input_shape,
        input
    ))?])?;

    match outputs.len() {
        0 => Err(IndexError::Inference(
            "model produced no output tensor".to_string(),
        )),
        _ => {
            let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
            Ok((shape.to_vec(), data.to_vec()))
        }
    }
}
