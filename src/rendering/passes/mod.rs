pub mod mesh_pass;
