/// Execution providers to try for the face-mesh session, best first.
///
/// ONNX Runtime falls back to CPU when none of these can be registered.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}
