pub mod ads129x;
