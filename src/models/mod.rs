// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque entité correspond à une table PostgreSQL avec SeaORM.
//
// Liste des modules:
//   - users : Utilisateurs (gérés par le service d'auth externe)
//   - generation : Demandes de génération IA + cartes candidates (JSONB)
//   - flashcard : Cartes sauvegardées (manual / ai_full / ai_edited)
//   - dto : Requêtes et réponses de l'API
//
// Points d'attention:
//   - Pas de SQL brut, tout passe par SeaORM
//   - users → generations / flashcards : ON DELETE CASCADE
//   - generations → flashcards : ON DELETE SET NULL (la carte survit)
//
// ============================================================================

pub mod users;
pub mod generation;
pub mod flashcard;
pub mod dto;
