// Test modules for Tunnelgate
// Shared test doubles live in helpers; each other module covers one area

mod helpers;
mod portforward_types_tests;
mod provider_tests;
