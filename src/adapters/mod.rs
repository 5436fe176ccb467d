// 外部系統的具體實作：推理服務 HTTP 客戶端、資料檔讀取
pub mod anchors;
pub mod gemini;
