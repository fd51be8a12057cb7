// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod actions;
pub mod backend;
pub mod forms;
pub mod ids;
pub mod import;
pub mod model;
pub mod selection;
pub mod session;
pub mod state;
pub mod table;
pub mod validation;

pub use actions::*;
pub use backend::*;
pub use forms::*;
pub use ids::*;
pub use import::*;
pub use model::*;
pub use selection::*;
pub use session::*;
pub use state::*;
pub use table::*;
