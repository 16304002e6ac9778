pub mod box_merger;
pub mod cascade_classifier;
pub mod face_detector;
pub mod face_locator;
pub mod gray_image;
