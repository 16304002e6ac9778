pub mod frame_anonymizer;
