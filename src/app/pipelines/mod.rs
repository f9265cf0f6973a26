pub mod load_pipeline;
