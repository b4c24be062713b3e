pub mod clusters;
pub mod dock;
pub mod interface;
pub mod run;
