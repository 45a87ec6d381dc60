pub mod onnx;
pub mod persistence;
