mod screenshot;
