pub mod hirschberg_sinclair;
