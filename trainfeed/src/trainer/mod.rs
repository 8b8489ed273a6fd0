//! Training-service client.

mod client;

pub use client::{
    START_PATH, STATUS_PATH, TRAIN_PATH, TrainResult, TrainerClient, TrainingService,
    TrainingStatus,
};
