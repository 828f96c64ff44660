// Configuration loading

pub mod settings;

pub use settings::{
    with_csv_extension, ExportSettings, ReviewSettings, Settings, TrainingSettings, API_BASE_ENV,
};
