//! In-memory document store
//!
//! The store is fed by the ingestion side (manual entry, imports, a JSON
//! knowledge-base file) and only read by the retrieval pipeline. Store order is
//! significant: it is the tie-break order for ranking and the order used by
//! the degraded "first N documents" fallbacks.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::config::AppConfig;
use crate::models::Department;
use crate::models::Document;
use crate::rag::permissions::filter_permitted;
use crate::NexusError;
use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    /// Build a store, rejecting duplicate document identities
    pub fn new(documents: Vec<Document>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(documents.len());
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(NexusError::KnowledgeBase(format!(
                    "duplicate document id: {}",
                    doc.id
                )));
            }
        }
        Ok(Self { documents })
    }

    /// Store populated with the built-in knowledge base
    pub fn seeded() -> Self {
        Self {
            documents: seed_documents(),
        }
    }

    /// Load a JSON array of documents
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let documents: Vec<Document> = serde_json::from_str(&content)?;
        info!(
            "Loaded {} documents from knowledge base {}",
            documents.len(),
            path.display()
        );
        Self::new(documents)
    }

    /// Store described by the `[knowledge_base]` section
    pub fn load(config: &AppConfig) -> Result<Self> {
        match &config.knowledge_base.path {
            Some(path) => Self::from_json_file(path),
            None => {
                info!("No knowledge base file configured, using built-in documents");
                Ok(Self::seeded())
            }
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Insert a new document at the end, or replace the one with the same id in place
    pub fn upsert(&mut self, document: Document) {
        if let Some(existing) = self.documents.iter_mut().find(|d| d.id == document.id) {
            *existing = document;
        } else {
            self.documents.push(document);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Document> {
        let idx = self.documents.iter().position(|d| d.id == id)?;
        Some(self.documents.remove(idx))
    }

    /// Documents the given unit may read, in store order
    pub fn permitted_for(&self, department: Department) -> Vec<&Document> {
        filter_permitted(&self.documents, department)
    }
}

fn seed_document(
    id: &str,
    name: &str,
    content: &str,
    department: Department,
    link: &str,
    mime_type: &str,
) -> Document {
    Document {
        id: id.to_string(),
        name: name.to_string(),
        content: content.to_string(),
        department,
        web_view_link: link.to_string(),
        mime_type: mime_type.to_string(),
    }
}

/// Built-in knowledge base used when no file is configured
pub fn seed_documents() -> Vec<Document> {
    vec![
        seed_document(
            "gen-1",
            "Noi_quy_cong_ty_2024.pdf",
            "Giờ làm việc: 8:30 sáng đến 5:30 chiều. Nghỉ trưa 12:00 - 13:30. Trang phục công sở lịch sự vào thứ 2, tự do các ngày còn lại.",
            Department::General,
            "https://docs.google.com/document/d/mock-handbook",
            "application/pdf",
        ),
        seed_document(
            "hr-1",
            "Quy_trinh_tuyen_dung.gdoc",
            "Quy trình tuyển dụng gồm 3 vòng: Sơ loại hồ sơ, Phỏng vấn chuyên môn, và Phỏng vấn văn hóa. Mức lương thử việc bằng 85% lương chính thức.",
            Department::Hr,
            "https://docs.google.com/document/d/mock-recruitment",
            "application/vnd.google-apps.document",
        ),
        seed_document(
            "chess-1",
            "Giao_an_co_vua_can_ban.pdf",
            "Bài 1: Giới thiệu bàn cờ và các quân cờ. Quân Xe đi thẳng và ngang. Quân Tượng đi chéo. Mục tiêu là chiếu hết Vua đối phương.",
            Department::ChessTeacher,
            "https://docs.google.com/document/d/mock-chess",
            "application/pdf",
        ),
        seed_document(
            "art-1",
            "Nguyen_tac_pha_mau.pptx",
            "3 màu cơ bản: Đỏ, Vàng, Xanh dương. Pha Đỏ + Vàng = Cam. Pha Vàng + Xanh = Lục.",
            Department::ArtTeacher,
            "https://docs.google.com/presentation/d/mock-art",
            "application/vnd.google-apps.presentation",
        ),
        seed_document(
            "online-1",
            "Kich_ban_chot_sale_inbox.docx",
            "Khi khách hàng hỏi giá, không trả lời ngay. Hãy hỏi về nhu cầu của bé (độ tuổi, sở thích) để tư vấn khóa học phù hợp trước.",
            Department::OnlineSales,
            "https://docs.google.com/document/d/mock-sale-script",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
    ]
}
