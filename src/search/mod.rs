//! Tantivy-based search index module.
//!
//! Provides full-text search over proposals with field boosting.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Proposal;

/// Field boost values.
const BOOST_TITLE: f32 = 10.0;
const BOOST_TRACK: f32 = 6.0;
const BOOST_DESCRIPTION: f32 = 4.0;

/// Search result with proposal and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub proposal_id: String,
    pub score: f32,
}

/// Search index schema fields.
struct SearchFields {
    proposal_id: Field,
    title: Field,
    description: Field,
    track: Field,
    session_type: Field,
}

/// Tantivy search index for proposals.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        // STRING so the id is a single indexed term usable for deletes
        let proposal_id = schema_builder.add_text_field("proposal_id", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT | STORED);
        let description = schema_builder.add_text_field("description", TEXT);
        let track = schema_builder.add_text_field("track", TEXT);
        let session_type = schema_builder.add_text_field("session_type", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            proposal_id,
            title,
            description,
            track,
            session_type,
        };

        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from proposals.
    pub async fn rebuild(&self, proposals: &[Proposal]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for proposal in proposals {
            writer.add_document(self.create_document(proposal))?;
        }
        writer.commit()?;

        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} proposals", proposals.len());
        Ok(())
    }

    /// Index (or re-index) a single proposal.
    pub async fn index_proposal(&self, proposal: &Proposal) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.proposal_id, &proposal.id);
        writer.delete_term(term);
        writer.add_document(self.create_document(proposal))?;
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Search for proposals matching the query.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![
                self.fields.title,
                self.fields.description,
                self.fields.track,
                self.fields.session_type,
            ],
        );

        let base_query = query_parser
            .parse_query(query_str)
            .map_err(|e| AppError::Search(format!("Invalid search query: {}", e)))?;

        let mut subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();

        let field_queries = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.track, BOOST_TRACK),
            (self.fields.description, BOOST_DESCRIPTION),
            (self.fields.session_type, 1.0),
        ];

        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                let boosted = BoostQuery::new(field_query, boost);
                subqueries.push((Occur::Should, Box::new(boosted)));
            }
        }

        let combined_query = if subqueries.is_empty() {
            base_query
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(limit + offset))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results: Vec<SearchResult> = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let proposal_id = doc.get_first(self.fields.proposal_id)?.as_str()?.to_string();
                Some(SearchResult { proposal_id, score })
            })
            .collect();

        Ok(results)
    }

    fn create_document(&self, proposal: &Proposal) -> TantivyDocument {
        doc!(
            self.fields.proposal_id => proposal.id.clone(),
            self.fields.title => proposal.title.clone(),
            self.fields.description => proposal.description.clone(),
            self.fields.track => proposal.track.clone(),
            self.fields.session_type => proposal.session_type.as_str().to_string()
        )
    }
}
