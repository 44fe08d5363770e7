mod test_assembler;
mod test_config;
mod test_mesh;
mod test_segmenter;
mod test_session;
