pub mod output;
pub mod paths;
pub mod reverse;
pub mod weak;
