pub mod host;
pub mod ignore;
pub mod memory;
pub mod selection;
pub mod tree;
