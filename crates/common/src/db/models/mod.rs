//! SeaORM entity models
//!
//! Database entities for the persona registry and the embedding table

mod embedding_chunk;
mod persona;

pub use persona::{
    Entity as PersonaEntity,
    ActiveModel as PersonaActiveModel,
    Column as PersonaColumn,
};

pub use embedding_chunk::vector_literal;

pub use embedding_chunk::{
    Entity as EmbeddingEntity,
    Column as EmbeddingColumn,
};
